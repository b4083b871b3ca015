//! Connection-level behavior checked against a hand-driven HTTP/1.1 server,
//! so resets and connection reuse can be observed directly.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use corebank_transport::{Backoff, ErrorKind, RetryPolicy, SoapRequest, Transport};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

const ENVELOPE: &str = "<soap:Envelope><soap:Body><AccountLookup>0011223344</AccountLookup></soap:Body></soap:Envelope>";

enum Step {
    /// Read the request, then close the connection without answering.
    Reset,
    Respond { status: u16, body: &'static str },
}

struct RawServer {
    url: String,
    connections: Arc<AtomicUsize>,
    requests: Arc<AtomicUsize>,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for RawServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn spawn_raw_server(steps: Vec<Step>) -> RawServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    let steps = Arc::new(Mutex::new(VecDeque::from(steps)));
    let connections = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(AtomicUsize::new(0));

    let task = {
        let connections = connections.clone();
        let requests = requests.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve_connection(stream, steps.clone(), requests.clone()));
            }
        })
    };

    RawServer {
        url: format!("http://{address}/ws/core"),
        connections,
        requests,
        task,
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    steps: Arc<Mutex<VecDeque<Step>>>,
    requests: Arc<AtomicUsize>,
) {
    let mut buf = Vec::new();
    loop {
        let request_len = loop {
            if let Some(len) = complete_request_len(&buf) {
                break len;
            }
            let mut chunk = [0u8; 4096];
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        };
        buf.drain(..request_len);
        requests.fetch_add(1, Ordering::SeqCst);

        let step = steps
            .lock()
            .expect("step queue mutex must not be poisoned")
            .pop_front()
            .unwrap_or(Step::Respond {
                status: 500,
                body: "<error>no step left</error>",
            });

        match step {
            Step::Reset => return,
            Step::Respond { status, body } => {
                let response = format!(
                    "HTTP/1.1 {status} Scripted\r\nContent-Type: text/xml; charset=utf-8\r\nContent-Length: {}\r\n\r\n{body}",
                    body.len()
                );
                if stream.write_all(response.as_bytes()).await.is_err() {
                    return;
                }
            }
        }
    }
}

fn complete_request_len(buf: &[u8]) -> Option<usize> {
    let header_end = buf.windows(4).position(|window| window == b"\r\n\r\n")? + 4;
    let head = std::str::from_utf8(&buf[..header_end]).ok()?;
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.trim().eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);
    let total = header_end + content_length;
    (buf.len() >= total).then_some(total)
}

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::builder()
        .max_attempts(max_attempts)
        .per_attempt_timeout(Duration::from_secs(5))
        .backoff(
            Backoff::exponential(Duration::from_millis(20), Duration::from_millis(20))
                .with_jitter(0.0),
        )
        .build()
        .expect("policy must build")
}

#[tokio::test]
async fn connection_resets_then_success_takes_three_attempts() {
    let server = spawn_raw_server(vec![
        Step::Reset,
        Step::Reset,
        Step::Respond {
            status: 200,
            body: "<ok/>",
        },
    ])
    .await;

    let response = Transport::new()
        .send(&SoapRequest::new(server.url.clone(), ENVELOPE), &policy(3))
        .await
        .expect("third attempt must succeed");

    assert_eq!(response.attempts(), 3);
    assert_eq!(response.text(), "<ok/>");
    let errors: Vec<_> = response.history().iter().map(|a| a.error).collect();
    assert_eq!(
        errors,
        vec![Some(ErrorKind::Network), Some(ErrorKind::Network), None]
    );
    assert_eq!(server.requests.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn discarded_attempts_release_their_connection() {
    let server = spawn_raw_server(vec![
        Step::Respond {
            status: 503,
            body: "<busy/>",
        },
        Step::Respond {
            status: 503,
            body: "<busy/>",
        },
        Step::Respond {
            status: 200,
            body: "<ok/>",
        },
    ])
    .await;

    let response = Transport::new()
        .send(&SoapRequest::new(server.url.clone(), ENVELOPE), &policy(3))
        .await
        .expect("third attempt must succeed");

    assert_eq!(response.attempts(), 3);
    assert_eq!(server.requests.load(Ordering::SeqCst), 3);
    assert_eq!(server.connections.load(Ordering::SeqCst), 1);
}
