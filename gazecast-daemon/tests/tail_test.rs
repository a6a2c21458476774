use futures_util::{SinkExt, StreamExt};
use gazecast_broadcaster::GazeMessage;
use gazecast_daemon::tail::tail;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Serve `samples`, then report the first frame the client sends back
async fn serve_once(listener: TcpListener, samples: Vec<GazeMessage>, close_after: bool) -> Option<Message> {
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = accept_async(stream).await.unwrap();
    for sample in samples {
        ws.send(sample.to_ws_message().unwrap()).await.unwrap();
    }
    if close_after {
        ws.send(Message::Close(None)).await.unwrap();
    }
    match tokio::time::timeout(Duration::from_secs(2), ws.next()).await {
        Ok(Some(Ok(frame))) => Some(frame),
        _ => None,
    }
}

fn samples() -> Vec<GazeMessage> {
    vec![
        GazeMessage { x: 0.25, y: 0.75, blink: false },
        GazeMessage { x: 0.0, y: 0.0, blink: true },
        GazeMessage { x: 0.5, y: 0.5, blink: false },
    ]
}

#[tokio::test]
async fn test_tail_sends_close_after_count() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/", listener.local_addr().unwrap());
    let server = tokio::spawn(serve_once(listener, samples(), false));

    let mut out = Vec::new();
    let n = tail(&url, Some(2), &mut out).await.unwrap();
    assert_eq!(n, 2);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "0.250000 0.750000 false\n0.000000 0.000000 true\n"
    );

    let reply = server.await.unwrap();
    assert!(matches!(reply, Some(Message::Close(_))), "got {:?}", reply);
}

#[tokio::test]
async fn test_tail_answers_server_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/", listener.local_addr().unwrap());
    let server = tokio::spawn(serve_once(listener, samples(), true));

    let mut out = Vec::new();
    let n = tail(&url, None, &mut out).await.unwrap();
    assert_eq!(n, 3);

    let reply = server.await.unwrap();
    assert!(matches!(reply, Some(Message::Close(_))), "got {:?}", reply);
}
