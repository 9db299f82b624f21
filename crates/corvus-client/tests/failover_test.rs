mod support;

use std::time::Duration;

use corvus_client::{ClientConfig, LoadBalancePolicy, RpcClient};
use corvus_common::Node;

use support::spawn_echo_server;

#[tokio::test]
async fn test_failing_node_is_never_selected() {
    let a = spawn_echo_server().await;
    let c = spawn_echo_server().await;
    // b exists in the cluster but nothing listens there
    let b = Node::new("127.0.0.1", 1);

    let config = ClientConfig {
        load_balance: LoadBalancePolicy::RoundRobin,
        failure_threshold: 2,
        request_timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let client = RpcClient::builder().config(config).start().unwrap();
    let cluster = vec![a.clone(), b.clone(), c.clone()];
    client.add_cluster(cluster.clone());

    for _ in 0..3 {
        client.manager().server_error(&b);
    }
    assert!(!client.manager().statuses().is_available(&b));

    // ten calls over the mixed cluster: every one must land on a live node
    for i in 0..10 {
        let response = client
            .invoke("echo", format!("call-{i}").into_bytes(), &cluster)
            .await;
        assert!(response.is_success(), "call {i} did not reach a live node");
    }

    // b picked up no traffic, so its counter never moved past the induced failures
    assert_eq!(client.manager().statuses().error_times(&b), 3);
    client.stop();
}

#[tokio::test]
async fn test_connect_failures_push_node_out_of_selection() {
    let a = spawn_echo_server().await;
    let b = Node::new("127.0.0.1", 1);

    let config = ClientConfig {
        load_balance: LoadBalancePolicy::RoundRobin,
        failure_threshold: 2,
        request_timeout: Duration::from_secs(2),
        connect_timeout: Duration::from_millis(500),
        ..Default::default()
    };
    let client = RpcClient::builder().config(config).start().unwrap();
    client.add_cluster(vec![a.clone(), b.clone()]);

    // drive direct calls into the dead node until it crosses the threshold
    for _ in 0..2 {
        let response = client.invoke("echo", Vec::new(), &[b.clone()]).await;
        assert!(!response.is_success());
    }
    assert!(!client.manager().statuses().is_available(&b));

    // failover now sticks to the live node without further caller action
    for _ in 0..5 {
        let response = client
            .invoke("echo", Vec::new(), &[a.clone(), b.clone()])
            .await;
        assert!(response.is_success());
    }
    client.stop();
}
