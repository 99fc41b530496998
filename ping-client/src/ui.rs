//! Console front end: stdin lines become Ping calls, outcomes are printed as they arrive.

use std::future::Future;

use ping_core::{Client, ClientError, Outcome, OutcomeReceiver};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

const PROGRESS_TEXT: &str = "Finding Simple Service. Please wait...";

/// One rendered outcome. Errors go to stderr, everything else to stdout.
#[derive(Debug, PartialEq, Eq)]
pub enum Line {
    Out(String),
    Err(String),
}

pub fn render(outcome: &Outcome) -> Line {
    match outcome {
        Outcome::ShowProgress => Line::Out(PROGRESS_TEXT.to_string()),
        Outcome::HideProgress => Line::Out("Connected.".to_string()),
        Outcome::Echo(text) => Line::Out(format!("Ping:  {}", text)),
        Outcome::Reply(text) => Line::Out(format!("Reply:  {}", text)),
        Outcome::Error(text) => Line::Err(format!("error: {}", text)),
    }
}

fn print(line: Line) {
    match line {
        Line::Out(s) => println!("{}", s),
        Line::Err(s) => eprintln!("{}", s),
    }
}

/// Run until the worker has stopped. Each line of `input` is a Ping argument.
/// EOF on `input` or completion of `shutdown` sends `Disconnect`; outcomes already
/// queued are still printed. A line that is not UTF-8 is reported and skipped.
pub async fn run<R, S>(
    client: Client,
    mut outcomes: OutcomeReceiver,
    input: R,
    shutdown: S,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = std::io::Result<()>>,
{
    let mut lines = input.split(b'\n');
    let mut input_open = true;
    let mut stopping = false;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            outcome = outcomes.recv() => match outcome {
                Some(o) => print(render(&o)),
                None => break,
            },
            segment = lines.next_segment(), if input_open => match segment {
                Ok(Some(bytes)) => submit(&client, bytes),
                Ok(None) => {
                    input_open = false;
                    stop(&client);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "input closed");
                    input_open = false;
                    stop(&client);
                }
            },
            res = &mut shutdown, if !stopping => {
                if let Err(e) = res {
                    tracing::warn!(error = %e, "shutdown signal failed");
                }
                stopping = true;
                input_open = false;
                stop(&client);
            }
        }
    }

    tokio::task::spawn_blocking(move || client.join()).await??;
    Ok(())
}

fn submit(client: &Client, mut bytes: Vec<u8>) {
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    if bytes.is_empty() {
        return;
    }
    let text = match String::from_utf8(bytes) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(error = %e, "skipping line that is not UTF-8");
            print(Line::Err("error: input line is not valid UTF-8".to_string()));
            return;
        }
    };
    if let Err(e) = client.ping(text) {
        tracing::warn!(error = %e, "ping not queued");
    }
}

fn stop(client: &Client) {
    match client.disconnect() {
        Ok(()) | Err(ClientError::Closed) => {}
        Err(e) => tracing::warn!(error = %e, "disconnect failed"),
    }
}
