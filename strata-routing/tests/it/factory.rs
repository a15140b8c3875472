use std::sync::Arc;

use bytes::Bytes;
use strata_common::{AddrInfo, Cid, Multiaddr, PeerId};
use strata_config::{
    DhtMode, RouterConfig, RouterParam, RouterParams, RouterType, Routing as RoutingConfig,
};
use strata_routing::{
    dht_routing_from_config, reframe_routing_from_config, ExtraDhtParams, FactoryError,
    MemoryDatastore, RouterFactory, Routing, DEFAULT_BUCKET_SIZE, DEFAULT_CONCURRENCY,
};
use tokio_util::sync::CancellationToken;

use crate::mock::{AcceptAll, DhtBuild, MockConnector, MockDht};

fn extra_params() -> ExtraDhtParams {
    ExtraDhtParams {
        track_full_network_dht: false,
        bootstrap_peers: vec![AddrInfo::new(PeerId::new("boot"))],
        host: PeerId::new("self"),
        validator: Arc::new(AcceptAll),
        datastore: Arc::new(MemoryDatastore::new()),
        cancel: CancellationToken::new(),
    }
}

fn dht_config(params: RouterParams) -> RouterConfig {
    RouterConfig::new(RouterType::Dht).with_parameters(params)
}

#[tokio::test]
async fn mode_none_builds_a_null_router() {
    let dht = MockDht::default();
    let conf = dht_config(RouterParams::new().with(RouterParam::DhtMode, "none"));

    let router = dht_routing_from_config(&conf, &extra_params(), &dht).unwrap();

    assert!(dht.builds.lock().is_empty(), "no DHT should be constructed");
    router.put_value(&Bytes::from_static(b"k"), Bytes::from_static(b"v")).await.unwrap();
    assert_eq!(router.get_value(&Bytes::from_static(b"k")).await.unwrap(), None);
    router.provide(&Cid::from("bafy"), true).await.unwrap();
    router.bootstrap().await.unwrap();
    assert!(dht.log.lock().is_empty());
}

#[test]
fn modes_map_to_dht_options() {
    let modes =
        [("dht", DhtMode::Auto), ("dhtclient", DhtMode::Client), ("dhtserver", DhtMode::Server)];

    for (raw, mode) in modes {
        let dht = MockDht::default();
        let conf = dht_config(RouterParams::new().with(RouterParam::DhtMode, raw));
        dht_routing_from_config(&conf, &extra_params(), &dht).unwrap();

        assert_eq!(
            dht.builds.lock().as_slice(),
            &[DhtBuild::Sparse {
                mode,
                concurrency: DEFAULT_CONCURRENCY,
                bootstrap: vec![AddrInfo::new(PeerId::new("boot"))],
                public: None,
            }]
        );
    }
}

#[test]
fn invalid_mode_names_the_value() {
    let dht = MockDht::default();
    let conf = dht_config(RouterParams::new().with(RouterParam::DhtMode, "dhtturbo"));

    let err = dht_routing_from_config(&conf, &extra_params(), &dht).err().unwrap();
    match &err {
        FactoryError::InvalidValue { param, value, valid } => {
            assert_eq!(*param, RouterParam::DhtMode);
            assert_eq!(value, "dhtturbo");
            assert_eq!(*valid, DhtMode::VALUES);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("\"dhtturbo\""), "{err}");
    assert!(dht.builds.lock().is_empty());
}

#[test]
fn missing_or_mistyped_mode_is_invalid() {
    let dht = MockDht::default();

    let err = dht_routing_from_config(&dht_config(RouterParams::new()), &extra_params(), &dht).err();
    assert!(matches!(err, Some(FactoryError::InvalidValue { value, .. }) if value.is_empty()));

    let mistyped = RouterParams::new().with(RouterParam::DhtMode, true);
    let err = dht_routing_from_config(&dht_config(mistyped), &extra_params(), &dht).err();
    assert!(matches!(err, Some(FactoryError::InvalidValue { value, .. }) if value == "true"));

    let listed = RouterParams::new().with(RouterParam::DhtMode, vec!["dht".to_string()]);
    let err = dht_routing_from_config(&dht_config(listed), &extra_params(), &dht).err();
    assert!(matches!(err, Some(FactoryError::InvalidValue { value, .. }) if value == r#"["dht"]"#));
    assert!(dht.builds.lock().is_empty());
}

#[test]
fn track_full_network_builds_full_routing_table() {
    let dht = MockDht::default();
    let conf = dht_config(
        RouterParams::new()
            .with(RouterParam::TrackFullNetworkDht, true)
            .with(RouterParam::DhtMode, "not-even-checked"),
    );

    let router = dht_routing_from_config(&conf, &extra_params(), &dht).unwrap();

    assert_eq!(
        dht.builds.lock().as_slice(),
        &[DhtBuild::Full {
            bucket_size: DEFAULT_BUCKET_SIZE,
            prefix: "/ipfs",
            bootstrap: vec![AddrInfo::new(PeerId::new("boot"))],
        }]
    );
    assert!(router.as_provide_many().is_some());
}

#[test]
fn full_network_flag_falls_back_to_context() {
    let dht = MockDht::default();
    let mut params = extra_params();
    params.track_full_network_dht = true;

    dht_routing_from_config(&dht_config(RouterParams::new()), &params, &dht).unwrap();
    assert!(matches!(dht.builds.lock()[0], DhtBuild::Full { .. }));

    // An explicit `false` wins over the context.
    let conf = dht_config(
        RouterParams::new()
            .with(RouterParam::TrackFullNetworkDht, false)
            .with(RouterParam::DhtMode, "dhtclient"),
    );
    dht_routing_from_config(&conf, &params, &dht).unwrap();
    assert!(matches!(dht.builds.lock()[1], DhtBuild::Sparse { mode: DhtMode::Client, .. }));
}

#[test]
fn bootstrappers_parameter_overrides_context_peers() {
    let dht = MockDht::default();
    let conf = dht_config(
        RouterParams::new()
            .with(RouterParam::DhtMode, "dhtserver")
            .with(RouterParam::PublicIpNetwork, true)
            .with(
                RouterParam::Bootstrappers,
                vec![
                    "/ip4/1.2.3.4/tcp/4001/p2p/QmA".to_string(),
                    "/ip6/::1/udp/4001/quic/p2p/QmA".to_string(),
                    "/p2p/QmB".to_string(),
                ],
            ),
    );

    dht_routing_from_config(&conf, &extra_params(), &dht).unwrap();

    let expected = vec![
        AddrInfo::new(PeerId::new("QmA"))
            .with_addr(Multiaddr::new("/ip4/1.2.3.4/tcp/4001"))
            .with_addr(Multiaddr::new("/ip6/::1/udp/4001/quic")),
        AddrInfo::new(PeerId::new("QmB")),
    ];
    assert_eq!(
        dht.builds.lock().as_slice(),
        &[DhtBuild::Sparse {
            mode: DhtMode::Server,
            concurrency: DEFAULT_CONCURRENCY,
            bootstrap: expected,
            public: Some(true),
        }]
    );
}

#[test]
fn bad_bootstrapper_is_rejected() {
    let dht = MockDht::default();
    let conf = dht_config(
        RouterParams::new()
            .with(RouterParam::DhtMode, "dht")
            .with(RouterParam::Bootstrappers, vec!["/ip4/1.2.3.4/tcp/4001".to_string()]),
    );

    let err = dht_routing_from_config(&conf, &extra_params(), &dht).err();
    assert!(matches!(
        err,
        Some(FactoryError::InvalidBootstrapper(entry)) if entry == "/ip4/1.2.3.4/tcp/4001"
    ));
}

#[test]
fn reframe_requires_endpoint() {
    let connector = MockConnector::default();
    let conf = RouterConfig::new(RouterType::Reframe);

    let err = reframe_routing_from_config(&conf, &connector).err().unwrap();
    assert!(matches!(
        err,
        FactoryError::MissingParameter {
            param: RouterParam::Endpoint,
            router_type: RouterType::Reframe
        }
    ));
    assert!(err.to_string().contains("Endpoint"), "{err}");
    assert!(err.to_string().contains("reframe"), "{err}");
    assert!(connector.endpoints.lock().is_empty());
}

#[test]
fn reframe_rejects_malformed_endpoint() {
    let connector = MockConnector::default();
    let conf = RouterConfig::new(RouterType::Reframe)
        .with_parameters(RouterParams::new().with(RouterParam::Endpoint, "not a url"));

    let err = reframe_routing_from_config(&conf, &connector).err();
    assert!(matches!(err, Some(FactoryError::InvalidEndpoint { .. })));
}

#[tokio::test]
async fn reframe_router_delegates_to_client() {
    let connector = MockConnector::default();
    let conf = RouterConfig::new(RouterType::Reframe).with_parameters(
        RouterParams::new().with(RouterParam::Endpoint, "http://127.0.0.1:9999/reframe"),
    );

    let router = reframe_routing_from_config(&conf, &connector).unwrap();
    assert_eq!(connector.endpoints.lock()[0].as_str(), "http://127.0.0.1:9999/reframe");

    let key = Bytes::from_static(b"/ipns/self");
    router.put_value(&key, Bytes::from_static(b"record")).await.unwrap();
    assert_eq!(router.get_value(&key).await.unwrap(), Some(Bytes::from_static(b"record")));

    assert_eq!(router.find_providers(&Cid::from("bafy"), 1).await.unwrap().len(), 1);
    assert!(router.find_peer(&PeerId::new("x")).await.is_err());

    router.provide(&Cid::from("local-only"), false).await.unwrap();
    router.provide(&Cid::from("announced"), true).await.unwrap();
    let pm = router.as_provide_many().expect("delegated routers batch provide");
    pm.provide_many(&[Cid::from("b1"), Cid::from("b2")]).await.unwrap();

    assert_eq!(
        *connector.service.provided.lock(),
        vec![Cid::from("announced"), Cid::from("b1"), Cid::from("b2")]
    );
}

fn factory(dht: &Arc<MockDht>, connector: &Arc<MockConnector>) -> RouterFactory {
    RouterFactory::new(extra_params(), dht.clone(), connector.clone())
}

#[test]
fn debug_output_leaves_out_capabilities() {
    let dht = Arc::new(MockDht::default());
    let connector = Arc::new(MockConnector::default());

    let debug = format!("{:?}", factory(&dht, &connector));

    assert!(debug.starts_with("RouterFactory { dht_params: ExtraDhtParams {"), "{debug}");
    assert!(debug.contains(r#"host: PeerId("self")"#), "{debug}");
    assert!(debug.ends_with(".. }"), "{debug}");
}

#[tokio::test]
async fn build_orders_routers_and_skips_failures() {
    let _ = tracing_subscriber::fmt::try_init();

    let routing = RoutingConfig::from_json(
        r#"{
            "Routers": {
                "remote": {
                    "Type": "reframe",
                    "Parameters": { "Endpoint": "http://127.0.0.1:8080", "Priority": 50 }
                },
                "broken": { "Type": "reframe", "Parameters": { "Priority": 1 } },
                "disabled": { "Type": "dht", "Enabled": false, "Parameters": { "Mode": "dht" } },
                "local": { "Type": "dht", "Parameters": { "Mode": "dhtclient", "Priority": 10 } },
                "fallback": { "Type": "dht", "Parameters": { "Mode": "none" } }
            }
        }"#,
    )
    .unwrap();

    let dht = Arc::new(MockDht::default());
    let connector = Arc::new(MockConnector::default());
    let build = factory(&dht, &connector).build(&routing);

    assert_eq!(build.failures.len(), 1);
    assert_eq!(build.failures[0].0, "broken");
    assert!(matches!(build.failures[0].1, FactoryError::MissingParameter { .. }));

    // local (10), remote (50), fallback (default)
    assert_eq!(build.router.routers().len(), 3);
    assert_eq!(dht.builds.lock().len(), 1);

    // The DHT tier is asked first, then the delegated one answers.
    let providers = build.router.find_providers(&Cid::from("bafy"), 0).await.unwrap();
    assert_eq!(providers.len(), 2);
    assert_eq!(dht.log.lock().as_slice(), &[("dht", "find_providers")]);

    // Only the delegated router batch provides.
    let pm = build.router.provide_many().unwrap();
    pm.provide_many(&[Cid::from("k")]).await.unwrap();
    assert_eq!(connector.service.provided.lock().len(), 1);
}

#[test]
fn build_without_routers_uses_routing_type() {
    let dht = Arc::new(MockDht::default());
    let connector = Arc::new(MockConnector::default());

    let routing = RoutingConfig::from_json(r#"{ "Type": "dhtserver" }"#).unwrap();
    let build = factory(&dht, &connector).build(&routing);
    assert!(build.failures.is_empty());
    assert_eq!(build.router.routers().len(), 1);
    assert!(matches!(dht.builds.lock()[0], DhtBuild::Sparse { mode: DhtMode::Server, .. }));

    let build = factory(&dht, &connector).build(&RoutingConfig::default());
    assert!(build.failures.is_empty());
    assert!(matches!(dht.builds.lock()[1], DhtBuild::Sparse { mode: DhtMode::Auto, .. }));
}

#[test]
fn invalid_routing_type_fails_the_default_router() {
    let dht = Arc::new(MockDht::default());
    let connector = Arc::new(MockConnector::default());

    let routing = RoutingConfig::from_json(r#"{ "Type": "dhtturbo" }"#).unwrap();
    let build = factory(&dht, &connector).build(&routing);

    assert!(build.router.routers().is_empty());
    assert_eq!(build.failures.len(), 1);
    assert_eq!(build.failures[0].0, "default");
    assert!(matches!(
        &build.failures[0].1,
        FactoryError::InvalidValue { value, .. } if value == "dhtturbo"
    ));
    assert!(dht.builds.lock().is_empty());
}
