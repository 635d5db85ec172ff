use std::{
    fmt::Display,
    future,
    io::{self as std_io, Write},
    path::PathBuf,
};

use chrono::Local;
use clap::Parser;
use color_eyre::owo_colors::OwoColorize;
use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{Clear, ClearType},
};
use eyre::Result;
use tokio::{
    io::{self, AsyncBufReadExt, BufReader},
    select,
    sync::mpsc,
};

use crate::{
    hardware::{Received, SerialLink, Transmit},
    latency::LatencyLog,
    misc::buf::BufMutExt,
    protocol::Message,
    ui::Annotation,
};

use super::CommonOpts;

#[derive(Clone, Debug, Parser)]
pub struct ConsoleOpts {
    #[command(flatten)]
    common: CommonOpts,

    /// Where `:plot` writes the latency chart, overriding the config file.
    #[arg(long)]
    plot_path: Option<PathBuf>,
}

/// Interactive line console. Every line typed is sent to the board and
/// echoes are matched back to measure latency. Lines starting with `:` are
/// console commands.
pub struct Console<L> {
    link: L,
    latency: LatencyLog,
    plot_path: PathBuf,
}

enum Input {
    Stdin(Option<String>),
    Serial(Option<Received>),
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

const HELP: &str = ":plot  save latency chart\n\
                    :pending  list unanswered messages\n\
                    :clear  clear the screen\n\
                    :quit  exit";

impl Console<SerialLink> {
    pub async fn run(opts: ConsoleOpts) -> Result<()> {
        let config = opts.common.load().await?;
        let link = SerialLink::open(&config.serial).await;

        let mut serial = match link.spawn_reader() {
            Ok(rx) => Some(rx),
            Err(e) => {
                annotate(Annotation::Error, format_args!("Not listening to the board: {e}"));
                None
            }
        };

        println!("{link}");
        println!("{HELP}");

        let mut console = Console {
            link,
            latency: LatencyLog::new(),
            plot_path: opts.plot_path.unwrap_or(config.console.plot_path),
        };

        let mut stdin = BufReader::new(io::stdin()).lines();

        loop {
            let input = select! {
                line = stdin.next_line() => Input::Stdin(line?),
                event = recv(&mut serial) => Input::Serial(event),
            };

            match input {
                Input::Stdin(Some(line)) => {
                    if console.handle_input(&line)? == Flow::Quit {
                        break;
                    }
                }

                Input::Stdin(None) => break,

                Input::Serial(Some(event)) => {
                    if !console.handle_received(event) {
                        serial = None;
                    }
                }

                Input::Serial(None) => {
                    tracing::debug!("Serial reader finished");
                    serial = None;
                }
            }
        }

        Ok(())
    }
}

impl<L: Transmit> Console<L> {
    fn handle_input(&mut self, line: &str) -> Result<Flow> {
        let text = line.trim();

        match text {
            "" => println!("{}", "Enter a message before sending".yellow()),
            ":quit" => return Ok(Flow::Quit),
            ":clear" => clear_screen()?,
            ":pending" => self.print_pending(),
            ":help" => println!("{HELP}"),

            ":plot" => match self.latency.render_plot(&self.plot_path) {
                Ok(()) => println!("Saved chart to {}", self.plot_path.display()),
                Err(e) => annotate(Annotation::Error, e),
            },

            message => self.send(message),
        }

        Ok(Flow::Continue)
    }

    fn send(&mut self, message: &str) {
        let mut buf = Vec::with_capacity(message.len() + 1);
        buf.put_line(message);

        let sent_at = Local::now();

        match self.link.transmit(&buf) {
            Ok(()) => {
                self.latency.record_send(message, sent_at);
                annotate(Annotation::Sent, message);
                detail(Annotation::Sent, format_args!("sent at {}", sent_at.format("%H:%M:%S")));
            }

            Err(e) => annotate(Annotation::Error, format_args!("Failed to send \"{message}\": {e}")),
        }
    }

    /// Returns `false` once the reader has stopped.
    fn handle_received(&mut self, event: Received) -> bool {
        let received_at = Local::now();

        let line = match event {
            Received::Line(line) => line,

            Received::Undecodable(e) => {
                annotate(Annotation::Error, e);
                return true;
            }

            Received::Closed(e) => {
                annotate(Annotation::Error, format_args!("Serial reader stopped: {e}"));
                return false;
            }
        };

        match Message::parse(&line) {
            Ok(Message::Echo(echo)) => {
                let sample = self.latency.record_echo(&echo, received_at);
                let latency_ms = sample.latency.as_secs_f64() * 1000.;

                annotate(Annotation::Received, &echo.message);
                detail(Annotation::Received, format_args!("processing time {latency_ms} ms"));
            }

            Ok(Message::PeerError) => {
                annotate(Annotation::Error, "The board did not recognise the message");
                return true;
            }

            Ok(Message::Status(_) | Message::Text(_)) => annotate(Annotation::Received, &line),

            Err(e) => {
                annotate(Annotation::Error, format_args!("{e}: {line}"));
                return true;
            }
        }

        detail(
            Annotation::Received,
            format_args!("received at {}", received_at.format("%H:%M:%S")),
        );

        true
    }

    fn print_pending(&self) {
        if self.latency.pending().is_empty() {
            println!("No pending messages");
        }

        for pending in self.latency.pending() {
            println!("  {}  {}", pending.sent_at.format("%H:%M:%S"), pending.message);
        }
    }
}

/* == Output == */

fn annotate(annotation: Annotation, text: impl Display) {
    let tag = format!("[{annotation}]");

    match annotation {
        Annotation::Sent => println!("{} {text}", tag.blue()),
        Annotation::Received => println!("{} {text}", tag.yellow()),
        Annotation::Error => println!("{} {text}", tag.red()),
    }
}

fn detail(annotation: Annotation, text: impl Display) {
    let text = format!("  > {text}");

    match annotation {
        Annotation::Sent => println!("{}", text.blue()),
        Annotation::Received => println!("{}", text.yellow()),
        Annotation::Error => println!("{}", text.red()),
    }
}

fn clear_screen() -> Result<()> {
    let mut stdout = std_io::stdout();
    execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;
    stdout.flush()?;

    println!("{}", format!("-- Cleared at {} --", Local::now().format("%H:%M:%S")).blue());
    Ok(())
}

async fn recv(rx: &mut Option<mpsc::Receiver<Received>>) -> Option<Received> {
    match rx {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use crate::{dispatch::tests::MockLink, misc::buf::DecodeError};

    use super::*;

    fn console() -> Console<MockLink> {
        Console {
            link: MockLink::default(),
            latency: LatencyLog::new(),
            plot_path: PathBuf::from("latency.png"),
        }
    }

    #[test]
    fn test_echo_measures_latency() {
        let mut console = console();

        assert_eq!(console.handle_input("hello").unwrap(), Flow::Continue);
        assert_eq!(*console.link.lines.borrow(), ["hello\n"]);
        assert_eq!(console.latency.pending().len(), 1);

        assert!(console.handle_received(Received::Line("hello,250,ms".to_owned())));

        assert!(console.latency.pending().is_empty());
        assert_eq!(console.latency.samples().len(), 1);
        assert_eq!(console.latency.samples()[0].latency.as_millis(), 250);
    }

    #[test]
    fn test_meta_commands_are_not_sent() {
        let mut console = console();

        assert_eq!(console.handle_input("   ").unwrap(), Flow::Continue);
        assert_eq!(console.handle_input(":pending").unwrap(), Flow::Continue);
        assert_eq!(console.handle_input(":plot").unwrap(), Flow::Continue);
        assert_eq!(console.handle_input(":quit").unwrap(), Flow::Quit);

        assert!(console.link.lines.borrow().is_empty());
    }

    #[test]
    fn test_failed_send_is_not_pending() {
        let mut console = Console {
            link: MockLink {
                fail: true,
                ..Default::default()
            },
            ..console()
        };

        console.handle_input("hello").unwrap();
        assert!(console.latency.pending().is_empty());
    }

    #[test]
    fn test_malformed_replies_keep_reading() {
        let mut console = console();

        for line in ["ERROR", "hello,abc,ms", "hello,5,s", "a,b", "status:fan=x", "hello,1e300,ms"] {
            assert!(console.handle_received(Received::Line(line.to_owned())));
        }

        assert!(console.latency.samples().is_empty());

        assert!(console.handle_received(Received::Line("stray,1e17,ms".to_owned())));
        assert_eq!(console.latency.samples().len(), 1);

        let undecodable = DecodeError::InvalidUtf8(vec![0xff, 0xfe]);
        assert!(console.handle_received(Received::Undecodable(undecodable)));
        assert_eq!(console.latency.samples().len(), 1);
        assert!(!console.handle_received(Received::Closed(std_io::Error::other("gone"))));
    }
}
