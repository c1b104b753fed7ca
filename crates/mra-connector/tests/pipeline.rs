//! 端到端：文件配置存储 + 脚本事件源 + 真实 syslog TCP 通道。
//!
//! Reconciler 读到配置后启动 Supervisor，事件以 LEEF 2.0 行写到本机监听端口，
//! 完成通知把位置写进状态文件。

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mra_connector::{
    ComponentFactory, ConfigReconciler, EnvSecretResolver, EventPage, EventSource, FetchError,
    FileConfigStore, LiveComponents, SettingsFile,
};
use mra_core::{ConfigStore, ConfigurationSnapshot, Credential, Event, EventTypes, StreamCursor};
use mra_transport_syslog::LineConnector;
use parking_lot::Mutex;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct QueueSource {
    pages: Mutex<VecDeque<EventPage>>,
    cursors: Mutex<Vec<StreamCursor>>,
}

#[async_trait]
impl EventSource for QueueSource {
    async fn fetch_page(
        &self,
        cursor: &StreamCursor,
        _event_types: &EventTypes,
    ) -> Result<EventPage, FetchError> {
        self.cursors.lock().push(*cursor);
        let next = self.pages.lock().pop_front();
        Ok(next.unwrap_or_default())
    }
}

/// 事件源替换为脚本队列，syslog 通道使用真实实现。
struct LoopbackComponents {
    source: Arc<QueueSource>,
}

impl ComponentFactory for LoopbackComponents {
    fn event_source(
        &self,
        _snapshot: &ConfigurationSnapshot,
        credential: &Credential,
    ) -> Result<Arc<dyn EventSource>, FetchError> {
        assert_eq!(credential.expose(), "literal-api-key");
        let source: Arc<dyn EventSource> = self.source.clone();
        Ok(source)
    }

    fn line_connector(&self, snapshot: &ConfigurationSnapshot) -> Arc<dyn LineConnector> {
        LiveComponents.line_connector(snapshot)
    }
}

fn threat(id: &str, classification: &str) -> Event {
    Event::from_value(json!({
        "id": id,
        "type": "THREAT",
        "change_type": "CREATED",
        "created_time": "2024-05-01T00:00:00Z",
        "threat": { "classifications": [classification], "severity": "HIGH" },
    }))
    .expect("object")
}

fn write_config(path: &Path, port: u16) {
    let text = format!(
        r#"
[lookout]
entity_id = 4
entity_name = "acme"
api_domain = "api.lookout.com"
api_key = "literal-api-key"
stream_position = 100

[syslog]
host = "127.0.0.1"
port = {port}
forwarder_type = "qradar"
transport = "tcp"

[runner]
config_load_sleep_secs = 1
config_check_sleep_secs = 1
idle_wait_secs = 1
"#
    );
    std::fs::write(path, text).expect("write config");
}

/// 接受任意数量的连接，逐行转发到通道。
async fn serve_lines(listener: TcpListener, lines: mpsc::UnboundedSender<String>) {
    while let Ok((socket, _)) = listener.accept().await {
        let lines = lines.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(socket).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                if lines.send(line).is_err() {
                    break;
                }
            }
        });
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn events_reach_syslog_and_progress_is_persisted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(serve_lines(listener, tx));

    let config_path = dir.path().join("connector.toml");
    write_config(&config_path, port);
    let settings = SettingsFile::load(&config_path).expect("valid settings");
    let state_path = settings.state_path(&config_path);
    let store = Arc::new(FileConfigStore::new(&config_path, &state_path));

    let source = Arc::new(QueueSource {
        pages: Mutex::new(VecDeque::from([EventPage {
            events: vec![threat("e-1", "MALWARE"), threat("e-2", "PHISHING")],
            position: Some(130),
        }])),
        cursors: Mutex::new(Vec::new()),
    });

    let shutdown = CancellationToken::new();
    let reconciler = ConfigReconciler::new(
        store.clone(),
        Arc::new(EnvSecretResolver),
        Arc::new(LoopbackComponents {
            source: source.clone(),
        }),
        settings.reconciler_settings(),
    );
    let task = tokio::spawn(reconciler.run(shutdown.clone()));

    let mut received = Vec::new();
    for _ in 0..2 {
        let line = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("line within timeout")
            .expect("listener alive");
        received.push(line);
    }

    let mut persisted = None;
    for _ in 0..50 {
        let snapshot = store.get_by_id(4).await.expect("read").expect("configured");
        if snapshot.stream_position == 130 {
            persisted = Some(snapshot);
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(15), task)
        .await
        .expect("reconciler stops in time")
        .expect("reconciler task");

    assert!(
        received[0].contains(" acme LEEF:2.0|Lookout|MRAv2 Client|2.0|THREAT,MALWARE|"),
        "{}",
        received[0]
    );
    assert!(received[0].contains("externalId=e-1"), "{}", received[0]);
    assert!(received[1].contains("THREAT,PHISHING|"), "{}", received[1]);

    let persisted = persisted.expect("position persisted");
    assert_eq!(persisted.fetch_count, 2);
    assert!(persisted.fetched_at.is_some());
    assert_eq!(source.cursors.lock()[0], StreamCursor::Position(100));

    let config = std::fs::read_to_string(&config_path).expect("read config");
    assert!(config.contains("stream_position = 100"));
}
