//! End-to-end test: the demo workload answers the production probe client.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use ecsprobe::probe::{MinTlsVersion, ProbeClient, ProbeExpectation, probe_with_retry};
use ecsprobe::retry::{RetryPolicy, ThreadSleeper};
use ecsprobe::workload::{self, HELLO_BODY};
use rstest::*;

/// Starts the workload on two ephemeral loopback ports and returns them.
#[fixture]
fn workload_ports() -> Vec<u16> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
        runtime.block_on(async move {
            let listeners = workload::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), &[0, 0])
                .await
                .expect("bind loopback listeners");
            let ports = listeners
                .iter()
                .map(|listener| listener.local_addr().expect("listener address").port())
                .collect::<Vec<_>>();
            sender.send(ports).expect("report ports");
            workload::serve(listeners).await.expect("serve workload");
        });
    });
    receiver
        .recv_timeout(Duration::from_secs(10))
        .expect("workload should start")
}

#[rstest]
fn workload_answers_probe_on_both_ports(workload_ports: Vec<u16>) {
    let client = ProbeClient::new(Some(MinTlsVersion::Tls13), Duration::from_secs(5))
        .expect("probe client");
    let policy = RetryPolicy::new(5, Duration::from_millis(100)).expect("valid policy");

    assert_eq!(workload_ports.len(), 2);
    for port in workload_ports {
        let url = format!("http://127.0.0.1:{port}");
        let result = probe_with_retry(
            &client,
            &url,
            &ProbeExpectation::default(),
            policy,
            &ThreadSleeper,
        )
        .unwrap_or_else(|err| panic!("probe of {url} failed: {err}"));

        assert_eq!(result.status, 200);
        assert!(result.body_contains_expected);
    }
}

#[rstest]
fn workload_answers_any_method_and_path(workload_ports: Vec<u16>) {
    let port = workload_ports.first().copied().expect("one port");
    let response = reqwest::blocking::Client::new()
        .post(format!("http://127.0.0.1:{port}/some/deep/path?q=1"))
        .body("payload")
        .send()
        .expect("request sent");

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().expect("body"), HELLO_BODY);
}
