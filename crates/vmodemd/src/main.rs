//! Virtual modem bridge daemon.
//!
//! Provisions one pseudo-terminal per emulated line, answers incoming TCP
//! connections by ringing a free modem, and carries outgoing calls over TCP
//! after translating the dialed number to a host.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use vmodem::{BoxedStream, Modem, ModemConfig, ModemStatus};

mod dialer;
mod hooks;
mod pty;

use dialer::{NumberTranslator, TcpDialer};
use hooks::RuleHook;

pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(author, version, about = "Virtual Hayes modems on pseudo-terminals, calls over TCP")]
struct Options {
    /// Raise log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Listen address for incoming calls
    #[arg(short = 'a', long = "addr", default_value = "0.0.0.0:2020")]
    listen_addr: String,

    /// Default port for outgoing calls
    #[arg(short = 'p', long = "port", default_value_t = 2020)]
    default_port: u16,

    /// Directory for TTY symlinks
    #[arg(short = 't', long = "tty", default_value = "/tmp/vmodem")]
    tty_dir: PathBuf,

    /// First TTY index
    #[arg(short = 's', long = "start", default_value_t = 0)]
    start_num: usize,

    /// Number of modem lines
    #[arg(short = 'n', long = "num", default_value_t = 1)]
    num_ttys: usize,

    /// Max rings before an unanswered call is dropped
    #[arg(short = 'r', long = "ring", default_value_t = 10)]
    ring_max: u32,

    /// Do not listen for incoming calls
    #[arg(short = 'X', long = "nolisten")]
    no_listen: bool,

    /// Character sent when a call is answered, and expected back when dialing
    #[arg(short = 'S', long = "answer-char")]
    answer_char: Option<char>,

    /// Escape guard time in 50 ms units
    #[arg(short = 'G', long = "guard-time", default_value_t = 20)]
    guard_time: u8,

    /// Bypass the pre-guard check for buggy implementations
    #[arg(short = 'D', long = "disable-pre-guard")]
    disable_pre_guard: bool,

    /// Custom command rule, format: regex->output->result (repeatable)
    #[arg(short = 'C', long = "command")]
    commands: Vec<String>,

    /// Number translation, format: regex->format with $1.. groups (repeatable)
    #[arg(short = 'T', long = "translate")]
    translations: Vec<String>,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{d(%H:%M:%S)} {l} {m}\n")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))
        .expect("logger config");
    log4rs::init_config(config).expect("logger init");
}

#[tokio::main]
async fn main() {
    let options = Options::parse();
    init_logging(options.verbose);
    if let Err(err) = run(options).await {
        log::error!("{err}");
        std::process::exit(1);
    }
}

async fn run(options: Options) -> Res<()> {
    let answer_char = match options.answer_char {
        Some(c) if !c.is_ascii() => return Err(format!("answer char {c:?} is not ASCII").into()),
        Some(c) => Some(c as u8),
        None => None,
    };

    std::fs::create_dir_all(&options.tty_dir)?;

    let translator = NumberTranslator::new(&options.translations, options.default_port)?;
    let dialer = Arc::new(TcpDialer::new(translator));
    let command_hook = RuleHook::parse(&options.commands)?;

    let mut modems = Vec::new();
    let mut links = Vec::new();
    for i in 0..options.num_ttys {
        let id = format!("tty{}", options.start_num + i);
        let link = options.tty_dir.join(&id);
        let line = pty::open_line(&link)?;
        log::info!("{id}: {} -> {}", line.link_path.display(), line.slave_path.display());

        let modem = Modem::new(ModemConfig {
            id,
            tty: Some(Box::new(line.stream)),
            outgoing_call: Some(dialer.clone()),
            command_hook: command_hook
                .clone()
                .map(|hook| hook as Arc<dyn vmodem::CommandHook>),
            status_transition: Some(Arc::new(|modem, prev, next| {
                log::info!("{}: {prev} -> {next}", modem.id());
            })),
            ring_max: options.ring_max,
            answer_char,
            guard_time: options.guard_time,
            disable_pre_guard: options.disable_pre_guard,
            ..Default::default()
        })?;
        modems.push(modem);
        links.push(line.link_path);
    }

    let listener = if options.no_listen {
        None
    } else {
        Some(tokio::spawn(listen_task(
            options.listen_addr.clone(),
            modems.clone(),
        )))
    };

    println!("vmodemd started with {} line(s), press Ctrl+C to exit", modems.len());
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }

    log::info!("shutting down");
    if let Some(task) = listener {
        task.abort();
    }
    for modem in &modems {
        modem.close().await;
    }
    for link in &links {
        let _ = std::fs::remove_file(link);
    }
    Ok(())
}

/// Accept loop: each incoming connection rings the first idle modem.
async fn listen_task(addr: String, modems: Vec<Modem>) {
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            log::error!("cannot listen on {addr}: {err}");
            return;
        }
    };
    log::info!("listening on {addr}");
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                log::warn!("accept failed: {err}");
                continue;
            }
        };
        let mut conn: Option<BoxedStream> = Some(Box::new(stream));
        for modem in &modems {
            // Holding the line lock between the status check and the call
            // keeps a race from stealing the modem.
            let mut line = modem.lock().await;
            if line.status() == ModemStatus::Idle {
                if let Some(stream) = conn.take() {
                    log::info!("{}: incoming call from {peer}", line.id());
                    let _ = line.incoming_call(stream).await;
                }
                break;
            }
        }
        if conn.is_some() {
            log::warn!("no free modem for incoming call from {peer}");
        }
    }
}
