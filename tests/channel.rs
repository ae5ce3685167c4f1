//! End-to-end channel tests against an in-memory fake kernel.

mod common;

use std::collections::HashMap;
use std::time::Duration;

use common::{pair, pair_with};
use kernelwire_client::protocol::{msg_type, ExecuteOptions};
use kernelwire_client::{ChannelConfig, KernelwireError, Output};
use serde_json::json;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;

fn stdout(text: &str) -> Output {
    Output::Stream {
        name: "stdout".into(),
        text: text.into(),
    }
}

#[tokio::test]
async fn test_print_one() {
    let (channel, mut kernel) = pair().await;

    let kernel_side = async {
        let request = kernel.recv_request().await;
        assert_eq!(request.msg_type(), msg_type::EXECUTE_REQUEST);
        assert_eq!(request.content["code"], "print(1)");
        assert_eq!(request.content["allow_stdin"], false);
        kernel.run_print(&request, "1\n").await;
    };

    let (result, ()) = tokio::join!(channel.execute("print(1)", None), kernel_side);

    assert_eq!(result.unwrap(), vec![stdout("1\n")]);
    assert_eq!(channel.pending_count(), 0);
}

#[tokio::test]
async fn test_unbounded_timeout() {
    let (channel, mut kernel) = pair().await;

    let kernel_side = async {
        let request = kernel.recv_request().await;
        kernel.run_print(&request, "1\n").await;
    };

    let (result, ()) = tokio::join!(
        channel.execute("print(1)", Some(Duration::MAX)),
        kernel_side
    );

    assert_eq!(result.unwrap(), vec![stdout("1\n")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pending_count_settled_when_result_returns() {
    let (channel, mut kernel) = pair().await;

    let kernel_side = async {
        for _ in 0..20 {
            let request = kernel.recv_request().await;
            kernel.run_print(&request, "").await;
        }
    };

    let caller_side = async {
        for _ in 0..20 {
            channel.execute("pass", None).await.unwrap();
            assert_eq!(channel.pending_count(), 0);
        }
    };

    tokio::join!(caller_side, kernel_side);
}

#[tokio::test]
async fn test_request_envelope_shape() {
    let config = ChannelConfig {
        username: "alice".into(),
        ..ChannelConfig::default()
    };
    let (channel, mut kernel) = pair_with(config).await;

    let kernel_side = async {
        let a = kernel.recv_request().await;
        kernel.run_print(&a, "").await;
        let b = kernel.recv_request().await;
        kernel.run_print(&b, "").await;
        (a, b)
    };

    let options = ExecuteOptions {
        silent: true,
        ..ExecuteOptions::default()
    };
    let (ra, rb, (a, b)) = tokio::join!(
        channel.execute("x = 1", None),
        async {
            // Keep the second request strictly after the first
            tokio::task::yield_now().await;
            channel.execute_with("x", &options, None).await
        },
        kernel_side
    );
    ra.unwrap();
    rb.unwrap();

    assert_ne!(a.msg_id(), b.msg_id());
    assert_eq!(a.header.session, channel.session_id());
    assert_eq!(a.header.session, b.header.session);
    assert_eq!(a.header.username, "alice");
    assert_eq!(a.header.version, "5.0");
    assert!(a.parent_header.is_none());
    assert_eq!(b.content["silent"], true);
}

#[tokio::test]
async fn test_concurrent_interleaved_requests() {
    let (channel, mut kernel) = pair().await;

    let kernel_side = async {
        let first = kernel.recv_request().await;
        let second = kernel.recv_request().await;
        let by_code: HashMap<String, _> = [first, second]
            .into_iter()
            .map(|r| (r.content["code"].as_str().unwrap().to_string(), r.header))
            .collect();
        let a = &by_code["a"];
        let b = &by_code["b"];

        kernel.status(a, "busy").await;
        kernel.status(b, "busy").await;
        kernel.stream(b, "B1").await;
        kernel.stream(a, "A1").await;
        kernel.stream(b, "B2").await;
        kernel.stream(a, "A2").await;
        kernel.status(b, "idle").await;
        kernel.stream(a, "A3").await;
        kernel.status(a, "idle").await;
    };

    let (ra, rb, ()) = tokio::join!(
        channel.execute("a", None),
        channel.execute("b", None),
        kernel_side
    );

    assert_eq!(ra.unwrap(), vec![stdout("A1"), stdout("A2"), stdout("A3")]);
    assert_eq!(rb.unwrap(), vec![stdout("B1"), stdout("B2")]);
    assert_eq!(channel.pending_count(), 0);
}

#[tokio::test]
async fn test_unrelated_ids_are_discarded() {
    let (channel, mut kernel) = pair().await;

    let kernel_side = async {
        let request = kernel.recv_request().await;

        // Traffic for another client's request on the same kernel
        let mut stranger = request.header.clone();
        stranger.msg_id = "not-ours".into();
        kernel.status(&stranger, "busy").await;
        kernel.stream(&stranger, "noise").await;
        kernel.status(&stranger, "idle").await;

        kernel.run_print(&request, "mine").await;
    };

    let (result, ()) = tokio::join!(channel.execute("x", None), kernel_side);
    assert_eq!(result.unwrap(), vec![stdout("mine")]);
}

#[tokio::test]
async fn test_arrival_order_preserved() {
    let (channel, mut kernel) = pair().await;

    let kernel_side = async {
        let request = kernel.recv_request().await;
        let parent = &request.header;
        kernel.status(parent, "busy").await;
        for i in 0..50 {
            kernel.stream(parent, &format!("{} ", i)).await;
        }
        kernel
            .iopub(
                parent,
                msg_type::DISPLAY_DATA,
                json!({"data": {"text/plain": "<plot>"}, "metadata": {}}),
            )
            .await;
        kernel
            .iopub(
                parent,
                msg_type::EXECUTE_RESULT,
                json!({"data": {"text/plain": "42"}, "metadata": {}, "execution_count": 3}),
            )
            .await;
        kernel.status(parent, "idle").await;
    };

    let (result, ()) = tokio::join!(channel.execute("loop", None), kernel_side);
    let outputs = result.unwrap();

    assert_eq!(outputs.len(), 52);
    for (i, output) in outputs.iter().take(50).enumerate() {
        assert_eq!(output, &stdout(&format!("{} ", i)));
    }
    assert!(matches!(outputs[50], Output::DisplayData { .. }));
    assert!(matches!(
        outputs[51],
        Output::ExecuteResult {
            execution_count: Some(3),
            ..
        }
    ));
}

#[tokio::test]
async fn test_error_output_and_unknown_types() {
    let (channel, mut kernel) = pair().await;

    let kernel_side = async {
        let request = kernel.recv_request().await;
        let parent = &request.header;
        kernel.status(parent, "busy").await;
        kernel
            .iopub(parent, "clear_output", json!({"wait": false}))
            .await;
        kernel
            .iopub(
                parent,
                msg_type::ERROR,
                json!({"ename": "ZeroDivisionError", "evalue": "division by zero",
                       "traceback": ["Traceback", "ZeroDivisionError: division by zero"]}),
            )
            .await;
        kernel.status(parent, "idle").await;
    };

    let (result, ()) = tokio::join!(channel.execute("1/0", None), kernel_side);
    let outputs = result.unwrap();

    // clear_output is not an output type; only the error is collected
    assert_eq!(outputs.len(), 1);
    assert!(outputs[0].is_error());
}

#[tokio::test]
async fn test_malformed_frames_are_dropped() {
    let (channel, mut kernel) = pair().await;

    let kernel_side = async {
        let request = kernel.recv_request().await;
        kernel.send_raw(Message::text("not json")).await;
        kernel.send_raw(Message::text("{\"header\": 5}")).await;
        kernel
            .send_raw(Message::binary(vec![0xde, 0xad, 0xbe, 0xef]))
            .await;
        kernel.run_print(&request, "still here").await;
    };

    let (result, ()) = tokio::join!(channel.execute("x", None), kernel_side);
    assert_eq!(result.unwrap(), vec![stdout("still here")]);
    assert!(!channel.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_never_fires_early() {
    let (channel, mut kernel) = pair().await;
    let timeout = Duration::from_secs(2);
    let start = Instant::now();

    let kernel_side = async {
        let request = kernel.recv_request().await;
        kernel.status(&request.header, "busy").await;
        kernel.stream(&request.header, "partial").await;
        // Never goes idle
    };

    let (result, ()) = tokio::join!(channel.execute("while True: pass", Some(timeout)), kernel_side);
    let elapsed = start.elapsed();

    match result {
        Err(KernelwireError::ExecutionTimeout {
            timeout: reported,
            partial_outputs,
            ..
        }) => {
            assert_eq!(reported, timeout);
            assert_eq!(partial_outputs, vec![stdout("partial")]);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(elapsed >= timeout, "fired after {:?}", elapsed);
    assert!(elapsed < timeout + Duration::from_millis(100));

    // The channel survives a timeout
    assert_eq!(channel.pending_count(), 0);
    let kernel_side = async {
        let request = kernel.recv_request().await;
        kernel.run_print(&request, "ok").await;
    };
    let (result, ()) = tokio::join!(channel.execute("print('ok')", None), kernel_side);
    assert_eq!(result.unwrap(), vec![stdout("ok")]);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_only_affects_its_request() {
    let (channel, mut kernel) = pair().await;

    let kernel_side = async {
        let first = kernel.recv_request().await;
        let second = kernel.recv_request().await;
        let (short, long) = if first.content["code"] == "short" {
            (first, second)
        } else {
            (second, first)
        };
        kernel.status(&short.header, "busy").await;
        kernel.status(&long.header, "busy").await;

        tokio::time::sleep(Duration::from_secs(3)).await;
        kernel.run_print(&long, "done").await;
    };

    let (short, long, ()) = tokio::join!(
        channel.execute("short", Some(Duration::from_secs(1))),
        channel.execute("long", Some(Duration::from_secs(10))),
        kernel_side
    );

    assert!(matches!(short, Err(KernelwireError::ExecutionTimeout { .. })));
    assert_eq!(long.unwrap(), vec![stdout("done")]);
}

#[tokio::test]
async fn test_close_cancels_outstanding_requests() {
    let (channel, mut kernel) = pair().await;

    let closer = async {
        let a = kernel.recv_request().await;
        let b = kernel.recv_request().await;
        kernel.status(&a.header, "busy").await;
        kernel.stream(&a.header, "half").await;
        kernel.status(&b.header, "busy").await;
        // Let the engine see both busy states before closing
        tokio::time::sleep(Duration::from_millis(20)).await;
        channel.close().await
    };

    let (ra, rb, closed) = tokio::join!(
        channel.execute("a", None),
        channel.execute("b", None),
        closer
    );

    closed.unwrap();
    assert!(matches!(ra, Err(KernelwireError::Cancelled { .. })));
    assert!(matches!(rb, Err(KernelwireError::Cancelled { .. })));
    assert_eq!(channel.pending_count(), 0);
    assert!(channel.is_closed());

    // The kernel sees the socket close
    assert!(kernel.try_recv_request(Duration::from_secs(1)).await.is_none());

    // Closing again is fine; executing is not
    channel.close().await.unwrap();
    let err = channel.execute("late", None).await.unwrap_err();
    assert!(matches!(err, KernelwireError::Transport(_)));
}

#[tokio::test]
async fn test_peer_close_cancels_outstanding_requests() {
    let (channel, mut kernel) = pair().await;

    let kernel_side = async {
        let request = kernel.recv_request().await;
        kernel.status(&request.header, "busy").await;
        kernel.close().await;
    };

    let (result, ()) = tokio::join!(channel.execute("x", None), kernel_side);

    assert!(matches!(result, Err(KernelwireError::Cancelled { .. })));
    assert_eq!(channel.pending_count(), 0);
}

#[tokio::test]
async fn test_dropped_socket_cancels_outstanding_requests() {
    let (channel, mut kernel) = pair().await;

    let kernel_side = async move {
        let _ = kernel.recv_request().await;
        drop(kernel);
    };

    let (result, ()) = tokio::join!(channel.execute("x", None), kernel_side);

    assert!(matches!(result, Err(KernelwireError::Cancelled { .. })));
}

#[tokio::test]
async fn test_drop_releases_channel() {
    let (channel, mut kernel) = pair().await;
    drop(channel);

    // Engine shuts down and closes the socket
    assert!(kernel.try_recv_request(Duration::from_secs(1)).await.is_none());
}
