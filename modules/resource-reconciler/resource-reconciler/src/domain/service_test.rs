//! Service tests over a scripted in-memory transport.
//!
//! Each test queues the exact responses the server gives, runs under a
//! paused clock and checks both the result and the requests that went out.

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use http::{Method, StatusCode};
    use parking_lot::Mutex;
    use resource_reconciler_sdk::{
        Encoding, ReconcilerError, ResourceAddress, ResourceDocument, ResourceReconcilerClient,
    };
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    use crate::config::{ReconcilerConfig, RetryConfig};
    use crate::domain::diagnostics::testing::RecordingSink;
    use crate::domain::error::DomainError;
    use crate::domain::local_client::ResourceReconcilerLocalClient;
    use crate::domain::service::Service;
    use crate::domain::transport::{ApiRequest, ApiResponse, HttpTransport, TransportError};

    type Reply = Result<ApiResponse, TransportError>;

    /// Answers from a queue and records every request. An exhausted queue
    /// answers 500.
    #[derive(Default)]
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Reply>>,
        requests: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().collect()),
                requests: Mutex::default(),
            })
        }

        fn calls(&self) -> Vec<(Method, String)> {
            self.requests
                .lock()
                .iter()
                .map(|r| (r.method.clone(), r.path.clone()))
                .collect()
        }

        fn body(&self, index: usize) -> String {
            let requests = self.requests.lock();
            let body = requests[index].body.clone().unwrap_or_default();
            String::from_utf8(body.to_vec()).unwrap()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
            self.requests.lock().push(request);
            self.replies.lock().pop_front().unwrap_or_else(|| {
                Ok(ApiResponse::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "script exhausted",
                ))
            })
        }
    }

    fn status(code: u16) -> Reply {
        Ok(ApiResponse::new(
            StatusCode::from_u16(code).unwrap(),
            format!("status {code}"),
        ))
    }

    fn ok_body(body: &'static str) -> Reply {
        Ok(ApiResponse::new(StatusCode::OK, body))
    }

    fn repeat(code: u16, n: usize) -> Vec<Reply> {
        (0..n).map(|_| status(code)).collect()
    }

    fn get(path: &str) -> (Method, String) {
        (Method::GET, path.to_owned())
    }

    fn post(path: &str) -> (Method, String) {
        (Method::POST, path.to_owned())
    }

    fn put(path: &str) -> (Method, String) {
        (Method::PUT, path.to_owned())
    }

    fn delete(path: &str) -> (Method, String) {
        (Method::DELETE, path.to_owned())
    }

    /// Long budget of 5 and short budget of 3, both 3 seconds apart.
    fn service(transport: &Arc<ScriptedTransport>) -> (Service, Arc<RecordingSink>) {
        let mut config = ReconcilerConfig::default();
        config.long_retry = RetryConfig {
            max_attempts: 5,
            delay_ms: 3_000,
        };
        let sink = Arc::new(RecordingSink::default());
        let service = Service::new(transport.clone(), &config, sink.clone());
        (service, sink)
    }

    fn config_map() -> ResourceDocument {
        ResourceDocument::new(
            ResourceAddress::new("api/v1", "team-a", "configmaps", "cfg"),
            Encoding::Yaml,
            "data:\n  mode: fast\n",
        )
    }

    const CONFIG_MAPS: &str = "api/v1/namespaces/team-a/configmaps";
    const CONFIG_MAP: &str = "api/v1/namespaces/team-a/configmaps/cfg";

    #[tokio::test(start_paused = true)]
    async fn create_posts_enveloped_content() {
        let transport = ScriptedTransport::new([status(201)]);
        let (svc, sink) = service(&transport);

        svc.create(&config_map().with_labels([("app", "web")]))
            .await
            .unwrap();

        assert_eq!(transport.calls(), vec![post(CONFIG_MAPS)]);
        assert_eq!(
            transport.body(0),
            "metadata:\n  name: \"cfg\"\n  namespace: \"team-a\"\n  labels:\n    app: \"web\"\n\
             data:\n  mode: fast\n"
        );
        assert!(sink.reports.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn create_conflict_falls_back_to_update() {
        let transport = ScriptedTransport::new([status(409), status(200)]);
        let (svc, _) = service(&transport);

        svc.create(&config_map()).await.unwrap();

        assert_eq!(transport.calls(), vec![post(CONFIG_MAPS), put(CONFIG_MAP)]);
        assert_eq!(transport.body(0), transport.body(1));
    }

    #[tokio::test(start_paused = true)]
    async fn create_retries_server_errors_with_fixed_delay() {
        let transport = ScriptedTransport::new([status(500), status(503), status(201)]);
        let (svc, sink) = service(&transport);
        let started = Instant::now();

        svc.create(&config_map()).await.unwrap();

        assert_eq!(transport.calls().len(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(6));
        assert_eq!(sink.attempts.lock().len(), 2);
        assert!(sink.reports.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn create_gives_up_after_long_budget() {
        let transport = ScriptedTransport::new(repeat(500, 5));
        let (svc, sink) = service(&transport);
        let started = Instant::now();

        let err = svc.create(&config_map()).await.unwrap_err();

        assert_eq!(transport.calls().len(), 5);
        assert_eq!(started.elapsed(), Duration::from_secs(12));
        assert_eq!(err.history().len(), 5);
        assert!(matches!(err, DomainError::Exhausted { .. }));

        let reports = sink.reports.lock();
        assert_eq!(reports.len(), 1);
        let (action, contents, history) = &reports[0];
        assert_eq!(action, &format!("create {CONFIG_MAP}"));
        assert!(String::from_utf8_lossy(contents.as_deref().unwrap()).contains("mode: fast"));
        assert_eq!(*history, 5);

        let public: ReconcilerError = err.into();
        assert!(matches!(public, ReconcilerError::ServerFailure { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_forbidden_is_rejected_after_budget() {
        let transport = ScriptedTransport::new(repeat(403, 5));
        let (svc, _) = service(&transport);

        let err = svc.create(&config_map()).await.unwrap_err();

        assert_eq!(transport.calls().len(), 5);
        assert!(matches!(err, DomainError::Rejected { status: 403, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn client_error_stops_immediately() {
        let transport = ScriptedTransport::new([status(422)]);
        let (svc, sink) = service(&transport);

        let err = svc.update(&config_map()).await.unwrap_err();

        assert_eq!(transport.calls(), vec![put(CONFIG_MAP)]);
        assert!(matches!(err, DomainError::Rejected { status: 422, .. }));
        assert_eq!(sink.reports.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn update_of_missing_resource_is_not_found() {
        let transport = ScriptedTransport::new([status(404)]);
        let (svc, _) = service(&transport);

        let err = svc.update(&config_map()).await.unwrap_err();

        assert_eq!(transport.calls().len(), 1);
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_json_content_sends_nothing() {
        let transport = ScriptedTransport::new(Vec::<Reply>::new());
        let (svc, _) = service(&transport);
        let doc = ResourceDocument::new(
            ResourceAddress::new("api/v1", "team-a", "configmaps", "cfg"),
            Encoding::Json,
            "[1, 2]",
        );

        let err = svc.create(&doc).await.unwrap_err();

        assert!(matches!(
            err,
            DomainError::Invalid(ReconcilerError::InvalidDocument(_))
        ));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn exists_maps_not_found_to_false() {
        let transport = ScriptedTransport::new([status(200), status(404)]);
        let (svc, _) = service(&transport);
        let address = config_map().address().clone();

        assert!(svc.exists(&address).await.unwrap());
        assert!(!svc.exists(&address).await.unwrap());
        assert_eq!(transport.calls(), vec![get(CONFIG_MAP), get(CONFIG_MAP)]);
    }

    #[tokio::test(start_paused = true)]
    async fn exists_uses_short_budget() {
        let transport = ScriptedTransport::new(repeat(500, 10));
        let (svc, _) = service(&transport);
        let started = Instant::now();

        let err = svc.exists(config_map().address()).await.unwrap_err();

        assert_eq!(transport.calls().len(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(6));
        assert_eq!(err.history().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_skips_protected_namespaces() {
        let transport = ScriptedTransport::new(Vec::<Reply>::new());
        let (svc, _) = service(&transport);

        for name in ["default", "kube-system", "kube-public"] {
            svc.delete(&ResourceAddress::namespace_object("api/v1", name))
                .await
                .unwrap();
        }

        assert!(transport.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_treats_not_found_as_done() {
        let transport = ScriptedTransport::new([status(404), status(500), status(200)]);
        let (svc, _) = service(&transport);
        let address = ResourceAddress::namespace_object("api/v1", "team-a");

        svc.delete(&address).await.unwrap();
        svc.delete(&address).await.unwrap();

        assert_eq!(
            transport.calls(),
            vec![
                delete("api/v1/namespaces/team-a"),
                delete("api/v1/namespaces/team-a"),
                delete("api/v1/namespaces/team-a"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn probe_retries_transport_failures() {
        let transport = ScriptedTransport::new([
            Err(TransportError::Connection("connection refused".to_owned())),
            Err(TransportError::Timeout(Duration::from_secs(10))),
            status(200),
        ]);
        let (svc, sink) = service(&transport);

        svc.probe_server().await.unwrap();

        assert_eq!(transport.calls(), vec![get("api/v1"); 3]);
        assert_eq!(sink.attempts.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn create_waits_for_resource_target() {
        let transport =
            ScriptedTransport::new([status(201), status(404), status(404), status(200)]);
        let (svc, _) = service(&transport);
        let doc = ResourceDocument::new(
            ResourceAddress::namespace_object("api/v1", "team-a"),
            Encoding::Yaml,
            "",
        )
        .with_wait_for(["serviceaccounts/default"]);

        svc.create(&doc).await.unwrap();

        let target = "api/v1/namespaces/team-a/serviceaccounts/default";
        assert_eq!(
            transport.calls(),
            vec![post("api/v1/namespaces"), get(target), get(target), get(target)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn empty_collection_is_not_ready() {
        let transport = ScriptedTransport::new([
            status(201),
            ok_body(r#"{"kind":"PodList","items":[]}"#),
            ok_body(r#"{"kind":"PodList","items":null}"#),
            ok_body(r#"{"kind":"PodList","items":[{"metadata":{"name":"p"}}]}"#),
        ]);
        let (svc, _) = service(&transport);
        let doc = ResourceDocument::new(
            ResourceAddress::new("apis/apps/v1", "team-a", "deployments", "web"),
            Encoding::Json,
            "{}",
        )
        .with_wait_for(["namespaces/team-a/pods"]);

        svc.create(&doc).await.unwrap();

        assert_eq!(transport.calls().len(), 4);
        assert_eq!(transport.calls()[3], get("api/v1/namespaces/team-a/pods"));
    }

    #[tokio::test(start_paused = true)]
    async fn grouped_resource_waits_under_core_api() {
        let transport = ScriptedTransport::new([
            status(201),
            ok_body(r#"{"items":[{}]}"#),
            status(200),
        ]);
        let (svc, _) = service(&transport);
        let doc = ResourceDocument::new(
            ResourceAddress::new("apis/apps/v1", "team-a", "deployments", "web"),
            Encoding::Json,
            "{}",
        )
        .with_wait_for(["pods", "apis/apps/v1/replicasets/web-1"]);

        svc.create(&doc).await.unwrap();

        assert_eq!(
            transport.calls(),
            vec![
                post("apis/apps/v1/namespaces/team-a/deployments"),
                get("api/v1/namespaces/team-a/pods"),
                get("apis/apps/v1/namespaces/team-a/replicasets/web-1"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn targets_are_waited_for_in_declaration_order() {
        let transport = ScriptedTransport::new([
            status(201),
            status(404),
            status(200),
            status(404),
            status(404),
            status(200),
        ]);
        let (svc, _) = service(&transport);
        let doc = config_map().with_wait_for(["secrets/token", "serviceaccounts/builder"]);

        svc.create(&doc).await.unwrap();

        let token = "api/v1/namespaces/team-a/secrets/token";
        let builder = "api/v1/namespaces/team-a/serviceaccounts/builder";
        assert_eq!(
            transport.calls(),
            vec![
                post(CONFIG_MAPS),
                get(token),
                get(token),
                get(builder),
                get(builder),
                get(builder),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_target_skips_remaining_targets() {
        let mut replies = vec![status(201)];
        replies.extend(repeat(404, 5));
        replies.push(status(200));
        let transport = ScriptedTransport::new(replies);
        let (svc, _) = service(&transport);
        let doc = config_map().with_wait_for(["secrets/token", "serviceaccounts/builder"]);

        let err = svc.create(&doc).await.unwrap_err();

        assert!(matches!(
            &err,
            DomainError::DependencyNotReady { target, .. } if target == "secrets/token"
        ));
        let calls = transport.calls();
        assert_eq!(calls.len(), 6);
        assert!(
            calls
                .iter()
                .all(|(_, path)| !path.ends_with("serviceaccounts/builder"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_wait_poll_fails_create() {
        let transport = ScriptedTransport::new([status(201), status(422), status(200)]);
        let (svc, sink) = service(&transport);
        let doc = config_map().with_wait_for(["secrets/token", "serviceaccounts/builder"]);
        let started = Instant::now();

        let err = svc.create(&doc).await.unwrap_err();

        assert!(matches!(err, DomainError::Rejected { status: 422, .. }));
        assert_eq!(
            transport.calls(),
            vec![
                post(CONFIG_MAPS),
                get("api/v1/namespaces/team-a/secrets/token"),
            ]
        );
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(sink.reports.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn yaml_collection_listing_is_counted() {
        let transport = ScriptedTransport::new([
            status(201),
            ok_body("kind: EndpointsList\nitems: []\n"),
            ok_body("kind: EndpointsList\nitems:\n- metadata:\n    name: db\n"),
        ]);
        let (svc, _) = service(&transport);
        let doc = config_map().with_wait_for(["endpoints"]);

        svc.create(&doc).await.unwrap();

        assert_eq!(
            transport.calls()[1..],
            [
                get("api/v1/namespaces/team-a/endpoints"),
                get("api/v1/namespaces/team-a/endpoints"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn missing_dependency_exhausts_wait() {
        let mut replies = vec![status(201)];
        replies.extend(repeat(404, 5));
        let transport = ScriptedTransport::new(replies);
        let (svc, sink) = service(&transport);
        let doc = config_map().with_wait_for(["secrets/token"]);

        let err = svc.create(&doc).await.unwrap_err();

        assert_eq!(transport.calls().len(), 6);
        match &err {
            DomainError::DependencyNotReady {
                target, history, ..
            } => {
                assert_eq!(target, "secrets/token");
                assert_eq!(history.len(), 5);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(sink.reports.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn conflict_fallback_still_waits() {
        let transport = ScriptedTransport::new([status(409), status(200), status(200)]);
        let (svc, _) = service(&transport);
        let doc = config_map().with_wait_for(["secrets/token"]);

        svc.create(&doc).await.unwrap();

        assert_eq!(
            transport.calls(),
            vec![
                post(CONFIG_MAPS),
                put(CONFIG_MAP),
                get("api/v1/namespaces/team-a/secrets/token"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_wait_target_is_invalid_path() {
        let transport = ScriptedTransport::new([status(201)]);
        let (svc, _) = service(&transport);
        let doc = config_map().with_wait_for(["a/b/c"]);

        let err = svc.create(&doc).await.unwrap_err();

        assert!(matches!(
            err,
            DomainError::Invalid(ReconcilerError::InvalidPath { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn apply_chooses_create_update_or_replace() {
        let transport = ScriptedTransport::new([status(201), status(200), status(200), status(201)]);
        let (svc, _) = service(&transport);
        let doc = config_map();

        let first = svc.apply(None, &doc).await.unwrap();
        let same = svc.apply(Some(&first), &doc).await.unwrap();

        let renamed = ResourceDocument::new(
            ResourceAddress::new("api/v1", "team-b", "configmaps", "cfg"),
            Encoding::Yaml,
            "data: {}\n",
        );
        let moved = svc.apply(Some(&same), &renamed).await.unwrap();

        assert_eq!(moved.resource_path(), "api/v1/namespaces/team-b/configmaps/cfg");
        assert_eq!(
            transport.calls(),
            vec![
                post(CONFIG_MAPS),
                put(CONFIG_MAP),
                delete(CONFIG_MAP),
                post("api/v1/namespaces/team-b/configmaps"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_between_attempts() {
        let transport = ScriptedTransport::new(repeat(500, 200));
        let cancel = CancellationToken::new();
        let (svc, sink) = service(&transport);
        let svc = svc.with_cancellation(cancel.clone());
        cancel.cancel();

        let err = svc.create(&config_map()).await.unwrap_err();

        assert_eq!(transport.calls().len(), 1);
        assert!(matches!(err, DomainError::Cancelled { .. }));
        assert_eq!(
            sink.reports.lock().as_slice(),
            &[(format!("create {CONFIG_MAP}"), None, 1)]
        );
        let err = ReconcilerError::from(err);
        assert!(matches!(err, ReconcilerError::Cancelled { .. }));
        assert_eq!(err.history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    #[tracing_test::traced_test]
    async fn local_client_logs_reported_failures_at_debug() {
        let transport = ScriptedTransport::new([status(404)]);
        let (svc, sink) = service(&transport);
        let client = ResourceReconcilerLocalClient::new(Arc::new(svc));

        let err = client.update(&config_map()).await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(sink.reports.lock().len(), 1);
        logs_assert(|lines: &[&str]| {
            let failed: Vec<_> = lines
                .iter()
                .filter(|l| l.contains("resource_reconciler call failed"))
                .collect();
            match failed.as_slice() {
                [line] if line.contains("DEBUG") => Ok(()),
                other => Err(format!("expected one debug line, got {other:?}")),
            }
        });
    }

    #[tokio::test(start_paused = true)]
    #[tracing_test::traced_test]
    async fn local_client_warns_on_invalid_input() {
        let transport = ScriptedTransport::new(Vec::<Reply>::new());
        let (svc, sink) = service(&transport);
        let client = ResourceReconcilerLocalClient::new(Arc::new(svc));
        let doc = ResourceDocument::new(
            ResourceAddress::new("api/v1", "team-a", "configmaps", "cfg"),
            Encoding::Json,
            "[1, 2]",
        );

        client.create(&doc).await.unwrap_err();

        assert!(sink.reports.lock().is_empty());
        assert!(logs_contain("WARN"));
        assert!(logs_contain("resource_reconciler call failed"));
    }
}
