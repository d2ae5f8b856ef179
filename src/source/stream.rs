//! TCP live feed.
//!
//! Each subscription opens its own connection and reads newline-delimited
//! JSON: either [`LiveMessage`] envelopes or bare packets.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};
use weatherwatch_types::TagFilter;

use super::{LiveMessage, LiveSink, PacketStream, SubscriptionHandle};
use crate::error::SubscribeError;

/// A live packet feed served over TCP.
///
/// # Example
///
/// ```no_run
/// use weatherwatch::TcpFeed;
///
/// let feed = TcpFeed::new("localhost:9090");
/// ```
#[derive(Debug, Clone)]
pub struct TcpFeed {
    addr: String,
    description: String,
}

impl TcpFeed {
    pub fn new(addr: &str) -> Self {
        Self {
            addr: addr.to_string(),
            description: format!("tcp: {}", addr),
        }
    }
}

impl PacketStream for TcpFeed {
    fn subscribe(
        &self,
        measurement: &str,
        tags: &TagFilter,
        sink: LiveSink,
    ) -> Result<SubscriptionHandle, SubscribeError> {
        if measurement.is_empty() {
            return Err(SubscribeError::Unsupported("empty measurement name".into()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SubscribeError::Connect(e.to_string()))?;

        let addr = self.addr.clone();
        let tags = tags.clone();
        let task = runtime.spawn(async move {
            match TcpStream::connect(&addr).await {
                Ok(stream) => {
                    info!("Live feed connected to {} for {}", addr, sink.measurement());
                    pump_lines(stream, &tags, &sink).await;
                }
                Err(e) => {
                    warn!("Failed to connect to {}: {}", addr, e);
                    sink.fail(format!("Failed to connect to {}: {}", addr, e));
                }
            }
        });

        Ok(SubscriptionHandle::from_task(task))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Forward matching packets from a line-oriented reader into `sink`.
///
/// Returns when the reader ends, fails, or the sink's receiver is dropped.
/// End of input and read errors are reported through the sink.
pub(crate) async fn pump_lines<R>(reader: R, tags: &TagFilter, sink: &LiveSink)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                sink.fail("Connection closed");
                return;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let message = match LiveMessage::parse_line(trimmed, sink.measurement()) {
                    Ok(message) => message,
                    Err(e) => {
                        debug!("Skipping unparseable line: {}", e);
                        continue;
                    }
                };
                if message.measurement != sink.measurement()
                    || !tags.matches(message.platform.as_deref(), message.stream.as_deref())
                {
                    continue;
                }
                if !sink.deliver(message.packet) {
                    return;
                }
            }
            Err(e) => {
                sink.fail(format!("Read error: {}", e));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::LiveEvent;
    use std::io::Cursor;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    fn drain(rx: &mut mpsc::UnboundedReceiver<LiveEvent>) -> Vec<LiveEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_pump_filters_measurement_and_tags() {
        let data = concat!(
            r#"{"measurement":"wx","platform":"roof","packet":{"timestamp":1,"wind_speed":1}}"#,
            "\n",
            r#"{"measurement":"other","packet":{"timestamp":2}}"#,
            "\n",
            r#"{"measurement":"wx","platform":"garden","packet":{"timestamp":3}}"#,
            "\n",
            "garbage\n",
            r#"{"timestamp":4,"wind_speed":2}"#,
            "\n",
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = LiveSink::new(7, "wx", tx);
        let tags = TagFilter {
            platform: Some("roof".into()),
            stream: None,
        };

        pump_lines(Cursor::new(data), &tags, &sink).await;

        let events = drain(&mut rx);
        let delivered: Vec<i64> = events
            .iter()
            .filter_map(|e| match e {
                LiveEvent::Packet { packet, .. } => Some(packet.timestamp),
                _ => None,
            })
            .collect();
        // the bare packet carries no platform tag, so the roof filter rejects it
        assert_eq!(delivered, vec![1]);
        assert!(matches!(events.last(), Some(LiveEvent::Failed { subscription: 7, .. })));
    }

    #[tokio::test]
    async fn test_tcp_feed_delivers_packets() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"{\"timestamp\":10,\"out_temperature\":4.5}\n")
                .await
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let feed = TcpFeed::new(&addr);
        let handle = feed.subscribe("wx", &TagFilter::default(), LiveSink::new(1, "wx", tx)).unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            LiveEvent::Packet { measurement, packet, .. } => {
                assert_eq!(measurement, "wx");
                assert_eq!(packet.get("out_temperature"), Some(4.5));
            }
            other => panic!("unexpected event {:?}", other),
        }

        handle.cancel();
        server.abort();
    }

    #[tokio::test]
    async fn test_tcp_feed_reports_connect_failure() {
        // Bind then drop to get a port nobody listens on
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = TcpFeed::new(&addr)
            .subscribe("wx", &TagFilter::default(), LiveSink::new(3, "wx", tx))
            .unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, LiveEvent::Failed { subscription: 3, .. }));
    }

    #[test]
    fn test_subscribe_outside_runtime_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = TcpFeed::new("localhost:1").subscribe("wx", &TagFilter::default(), LiveSink::new(1, "wx", tx));
        assert!(matches!(result, Err(SubscribeError::Connect(_))));
    }

    #[test]
    fn test_description() {
        assert_eq!(TcpFeed::new("localhost:9090").description(), "tcp: localhost:9090");
    }
}
