//! End-to-end tests against a scripted in-process driver.
//!
//! The fake driver speaks the real framed protocol over duplex pipes: it
//! announces objects with `__create__`, answers requests by id, pushes
//! events, and retires subtrees with `__dispose__`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use drover::factory::constructor_table;
use drover::objects::{Browser, DriverRoot, Frame, Page};
use drover_runtime::transport::encode_frame;
use drover_runtime::{Connection, PipeTransport, RemoteObject};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};

async fn write_frame(writer: &mut DuplexStream, value: &Value) {
    let frame = encode_frame(value).unwrap();
    writer.write_all(&frame).await.unwrap();
    writer.flush().await.unwrap();
}

async fn write_event(writer: &mut DuplexStream, guid: &str, method: &str, params: Value) {
    write_frame(
        writer,
        &json!({ "guid": guid, "method": method, "params": params }),
    )
    .await;
}

async fn write_create(
    writer: &mut DuplexStream,
    target: &str,
    type_tag: &str,
    guid: &str,
    initializer: Value,
) {
    write_event(
        writer,
        target,
        "__create__",
        json!({ "type": type_tag, "guid": guid, "initializer": initializer }),
    )
    .await;
}

async fn write_response(writer: &mut DuplexStream, id: u64, result: Value) {
    write_frame(writer, &json!({ "id": id, "result": result })).await;
}

async fn read_request(reader: &mut DuplexStream) -> Option<Value> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await.ok()?;
    let length = u32::from_le_bytes(len_buf) as usize;
    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload).await.ok()?;
    Some(serde_json::from_slice(&payload).unwrap())
}

/// Scripted driver: root handshake, one browser with one page and its main
/// frame, navigation with load/console/navigated events, then browser
/// disposal and stream shutdown.
async fn run_fake_driver(mut requests: DuplexStream, mut events: DuplexStream) {
    write_create(&mut events, "", "DriverRoot", "driver", json!({})).await;

    while let Some(request) = read_request(&mut requests).await {
        let id = request["id"].as_u64().unwrap();
        let guid = request["guid"].as_str().unwrap().to_string();
        let method = request["method"].as_str().unwrap().to_string();

        match method.as_str() {
            "launchBrowser" => {
                write_create(&mut events, "driver", "Browser", "browser-1", json!({})).await;
                write_response(&mut events, id, json!({ "browser": { "guid": "browser-1" } }))
                    .await;
            }
            "newPage" => {
                write_create(&mut events, "browser-1", "Frame", "frame-1", json!({})).await;
                write_create(
                    &mut events,
                    "browser-1",
                    "Page",
                    "page-1",
                    json!({ "mainFrame": { "guid": "frame-1" } }),
                )
                .await;
                write_response(&mut events, id, json!({ "page": { "guid": "page-1" } })).await;
            }
            "navigate" => {
                let url = request["params"]["url"].as_str().unwrap().to_string();
                write_response(&mut events, id, json!({})).await;
                write_event(&mut events, "frame-1", "navigated", json!({ "url": url })).await;
                write_event(&mut events, "page-1", "load", json!({})).await;
                write_event(
                    &mut events,
                    "page-1",
                    "console",
                    json!({ "type": "log", "text": "hello" }),
                )
                .await;
            }
            "close" if guid == "browser-1" => {
                write_response(&mut events, id, json!({})).await;
                write_event(&mut events, "browser-1", "__dispose__", json!({})).await;
                break;
            }
            other => panic!("fake driver got unexpected method: {other}"),
        }
    }
    // Dropping both halves ends the transport; the client observes a clean
    // close.
}

struct Harness {
    connection: Arc<Connection>,
    run_task: tokio::task::JoinHandle<()>,
    driver_task: tokio::task::JoinHandle<()>,
}

fn start() -> Harness {
    let (to_driver_write, to_driver_read) = duplex(64 * 1024);
    let (from_driver_read, from_driver_write) = duplex(64 * 1024);

    let (transport, message_rx) = PipeTransport::new(to_driver_write, from_driver_read);
    let parts = transport.into_transport_parts(message_rx);
    let connection = Connection::new(parts, constructor_table());

    let run_conn = Arc::clone(&connection);
    let run_task = tokio::spawn(async move { run_conn.run().await });
    let driver_task = tokio::spawn(run_fake_driver(to_driver_read, from_driver_write));

    Harness {
        connection,
        run_task,
        driver_task,
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_full_object_graph_lifecycle() {
    let harness = start();
    let connection = &harness.connection;

    let root = connection
        .wait_for_object("driver", Duration::from_secs(2))
        .await
        .unwrap()
        .downcast_arc::<DriverRoot>()
        .ok()
        .unwrap();

    let browser: Arc<Browser> = root.launch_browser().await.unwrap();
    let page: Arc<Page> = browser.new_page().await.unwrap();
    let frame: Arc<Frame> = page.main_frame().await.unwrap();

    let loads = Arc::new(AtomicUsize::new(0));
    let l = Arc::clone(&loads);
    page.on_load(move |_| {
        l.fetch_add(1, Ordering::SeqCst);
    });

    let console_lines: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let lines = Arc::clone(&console_lines);
    page.on_console(move |message| {
        lines.lock().push(format!("{}: {}", message.kind, message.text));
    });

    let navigations: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let urls = Arc::clone(&navigations);
    frame.on_navigated(move |event| {
        urls.lock().push(event.url.clone());
    });

    page.navigate("https://example.com").await.unwrap();

    wait_until(|| loads.load(Ordering::SeqCst) == 1).await;
    wait_until(|| !console_lines.lock().is_empty()).await;
    assert_eq!(console_lines.lock()[0], "log: hello");
    assert_eq!(navigations.lock().as_slice(), ["https://example.com"]);

    // Closing the browser retires its whole subtree.
    browser.close().await.unwrap();
    wait_until(|| connection.try_get_object("page-1").is_none()).await;
    assert!(connection.try_get_object("frame-1").is_none());
    assert!(connection.try_get_object("browser-1").is_none());

    // The driver hangs up after the close; the connection observes it and
    // refuses further calls.
    wait_until(|| connection.is_closed()).await;
    match root.launch_browser().await {
        Ok(_) => panic!("expected ConnectionClosed after hangup"),
        Err(err) => assert!(err.is_connection_closed(), "got: {err:?}"),
    }

    harness.driver_task.await.unwrap();
    harness.run_task.abort();
}

#[tokio::test]
async fn test_handshake_times_out_without_driver() {
    let (to_driver_write, _to_driver_read) = duplex(64 * 1024);
    let (from_driver_read, _from_driver_write) = duplex(64 * 1024);

    let (transport, message_rx) = PipeTransport::new(to_driver_write, from_driver_read);
    let parts = transport.into_transport_parts(message_rx);
    let connection = Connection::new(parts, constructor_table());

    let run_conn = Arc::clone(&connection);
    let run_task = tokio::spawn(async move { run_conn.run().await });

    match connection
        .wait_for_object("driver", Duration::from_millis(100))
        .await
    {
        Ok(object) => panic!("expected timeout, got object: {}", object.guid()),
        Err(err) => assert!(err.is_timeout(), "got: {err:?}"),
    }

    run_task.abort();
}
