//! The worker-channel adapter and the async expander.

mod common;

use std::time::Duration;

use common::{call, def_macro, quote, unq};
use makrell_meta::ast::{bin, curly, ident, num};
use makrell_meta::config::MetaConfig;
use makrell_meta::macros::{DefaultMacroContext, Expander, Expansion, MacroRegistry, MakrellMacro};
use makrell_meta::meta::{
    spawn_meta_worker, MetaResponse, MetaRuntime, WorkerMetaRuntime, WorkerRequest, WorkerResponse,
};
use makrell_meta::ErrorType;
use tokio::sync::mpsc;

fn inc() -> MakrellMacro {
    MakrellMacro::new(
        vec!["ns".to_string()],
        vec![
            bin(ident("n"), "=", bin(call("regular", vec![ident("ns")]), "@", num("0"))),
            quote(vec![bin(unq(ident("n")), "+", num("1"))]),
        ],
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn worker_evaluates_a_macro() {
    let worker = spawn_meta_worker(&MetaConfig::default());
    let out = worker
        .run_macro("inc", &inc(), &[num("41")], &MacroRegistry::new())
        .await
        .unwrap();
    assert_eq!(out, Expansion::Node(bin(num("41"), "+", num("1"))));
    assert_eq!(worker.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn worker_errors_keep_the_remote_message() {
    let worker = spawn_meta_worker(&MetaConfig::default());
    let broken = MakrellMacro::new(vec!["ns".to_string()], vec![ident("missing_name")]);
    let err = worker
        .run_macro("broken", &broken, &[], &MacroRegistry::new())
        .await
        .unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Isolation);
    assert!(err.to_string().starts_with("meta worker error:"));
    assert!(err.to_string().contains("missing_name"));
}

#[tokio::test(flavor = "multi_thread")]
async fn runaway_macro_does_not_block_later_requests() {
    let config = MetaConfig {
        worker_timeout_ms: 300,
        ..MetaConfig::default()
    };
    let worker = spawn_meta_worker(&config);
    let registry = MacroRegistry::new();
    let spin = MakrellMacro::new(
        vec!["ns".to_string()],
        vec![curly(vec![ident("while"), ident("true"), num("1")])],
    );
    let err = worker.run_macro("spin", &spin, &[], &registry).await.unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Isolation);
    assert!(err.to_string().starts_with("meta worker error:"));

    let out = worker
        .run_macro("inc", &inc(), &[num("4")], &registry)
        .await
        .unwrap();
    assert_eq!(out, Expansion::Node(bin(num("4"), "+", num("1"))));
}

#[tokio::test(flavor = "multi_thread")]
async fn async_expander_runs_macros_on_the_worker() {
    let worker = spawn_meta_worker(&MetaConfig::default());
    let sync_side = makrell_meta::meta::InProcessMetaRuntime::new();
    let mut expander = Expander::new(&sync_side);
    let program = [
        def_macro("inc", &["ns"], inc().body),
        bin(ident("x"), "=", call("inc", vec![call("inc", vec![num("1")])])),
    ];
    let out = expander.expand_async(&program, &worker).await.unwrap();
    assert_eq!(
        out,
        vec![bin(ident("x"), "=", bin(bin(num("1"), "+", num("1")), "+", num("1")))]
    );
}

#[tokio::test]
async fn worker_has_no_synchronous_form() {
    let worker = spawn_meta_worker(&MetaConfig::default());
    let err = MetaRuntime::run_macro(
        &worker,
        "inc",
        &inc(),
        &[num("1")],
        &MacroRegistry::new(),
        &DefaultMacroContext,
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "meta worker error: worker adapter requires an async compile pipeline"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn replies_are_routed_by_id() {
    let (request_tx, mut request_rx) = mpsc::unbounded_channel::<WorkerRequest>();
    let (response_tx, response_rx) = mpsc::unbounded_channel::<WorkerResponse>();
    let worker = WorkerMetaRuntime::connect(request_tx, response_rx, Duration::from_secs(5));

    // Answers the two requests in reverse order, after an unknown id.
    tokio::spawn(async move {
        let first = request_rx.recv().await.unwrap();
        let second = request_rx.recv().await.unwrap();
        let reply = |req: &WorkerRequest| WorkerResponse {
            id: req.id.clone(),
            body: MetaResponse::success(Expansion::Node(req.payload.args[0].clone())),
        };
        response_tx
            .send(WorkerResponse {
                id: "m999".to_string(),
                body: MetaResponse::failure("stray"),
            })
            .unwrap();
        response_tx.send(reply(&second)).unwrap();
        response_tx.send(reply(&first)).unwrap();
    });

    let registry = MacroRegistry::new();
    let def = inc();
    let one = [num("1")];
    let two = [num("2")];
    let (a, b) = tokio::join!(
        worker.run_macro("inc", &def, &one, &registry),
        worker.run_macro("inc", &def, &two, &registry),
    );
    assert_eq!(a.unwrap(), Expansion::Node(num("1")));
    assert_eq!(b.unwrap(), Expansion::Node(num("2")));
    assert_eq!(worker.in_flight(), 0);
}

#[tokio::test]
async fn silent_worker_times_out() {
    let (request_tx, _request_rx) = mpsc::unbounded_channel::<WorkerRequest>();
    let (_response_tx, response_rx) = mpsc::unbounded_channel::<WorkerResponse>();
    let worker = WorkerMetaRuntime::connect(request_tx, response_rx, Duration::from_millis(50));
    let err = worker
        .run_macro("inc", &inc(), &[num("1")], &MacroRegistry::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "meta worker error: no reply for m1 within 50 ms");
    assert_eq!(worker.in_flight(), 0);
}

#[tokio::test]
async fn closed_request_channel_is_an_error() {
    let (request_tx, request_rx) = mpsc::unbounded_channel::<WorkerRequest>();
    let (_response_tx, response_rx) = mpsc::unbounded_channel::<WorkerResponse>();
    drop(request_rx);
    let worker = WorkerMetaRuntime::connect(request_tx, response_rx, Duration::from_secs(1));
    let err = worker
        .run_macro("inc", &inc(), &[num("1")], &MacroRegistry::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "meta worker error: request channel is closed");
}

#[tokio::test]
async fn stopped_worker_wakes_its_waiters() {
    let (request_tx, mut request_rx) = mpsc::unbounded_channel::<WorkerRequest>();
    let (response_tx, response_rx) = mpsc::unbounded_channel::<WorkerResponse>();
    let worker = WorkerMetaRuntime::connect(request_tx, response_rx, Duration::from_secs(5));
    tokio::spawn(async move {
        let _ = request_rx.recv().await;
        drop(response_tx);
    });
    let err = worker
        .run_macro("inc", &inc(), &[num("1")], &MacroRegistry::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "meta worker error: no reply for m1, worker stopped");
}
