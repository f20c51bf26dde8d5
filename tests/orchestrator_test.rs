use async_trait::async_trait;
use singleton_service::framework::mock::{InitLog, MockService};
use singleton_service::{
    BoxError, Guarded, InitCell, InitFailure, Orchestrator, Service, ServiceError, ServiceHandle,
    ServiceId, ServiceState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Config (blocking) <- Db <- Users, all recording into `log`.
fn user_stack(
    log: &InitLog,
) -> (
    Orchestrator,
    ServiceHandle<MockService>,
    ServiceHandle<MockService>,
    ServiceHandle<MockService>,
) {
    let orchestrator = Orchestrator::new();
    let config = orchestrator
        .register_blocking("Config", MockService::new("Config").with_log(log))
        .expect("Failed to register Config");
    let db = orchestrator
        .register("Db", MockService::new("Db").with_log(log))
        .and_then(|db| db.requires(["Config"]))
        .expect("Failed to register Db");
    let users = orchestrator
        .register("Users", MockService::new("Users").with_log(log))
        .and_then(|users| users.requires(["Db"]))
        .expect("Failed to register Users");
    (orchestrator, config, db, users)
}

#[tokio::test]
async fn test_first_guarded_call_initializes_chain_in_order() {
    let log = InitLog::new();
    let (_orchestrator, config, db, users) = user_stack(&log);

    let first = users
        .call("get", |users| users.id().to_string())
        .await
        .expect("Failed to call Users.get(1)");
    assert_eq!(first, "Users");
    assert_eq!(log.initialized(), ["Config", "Db", "Users"]);
    assert_eq!(log.pinged(), ["Config", "Db", "Users"]);

    users
        .call("get", |_| ())
        .await
        .expect("Failed to call Users.get(2)");

    for handle in [&config, &db, &users] {
        assert_eq!(handle.state(), ServiceState::Ready);
        assert_eq!(handle.unguarded().initialize_calls(), 1);
        assert_eq!(handle.unguarded().ping_calls(), 1);
    }
}

#[tokio::test]
async fn test_ready_dependency_is_not_initialized_again() {
    let log = InitLog::new();
    let (orchestrator, _config, db, _users) = user_stack(&log);

    db.ready().await.expect("Failed to ready Db");
    orchestrator
        .ensure_ready("Users")
        .await
        .expect("Failed to ready Users");

    assert_eq!(log.initialized(), ["Config", "Db", "Users"]);
}

#[tokio::test]
async fn test_cycle_is_reported_before_any_initialization() {
    let orchestrator = Orchestrator::new();
    let a = orchestrator
        .register("A", MockService::new("A"))
        .and_then(|a| a.requires(["B"]))
        .expect("Failed to register A");
    let b = orchestrator
        .register("B", MockService::new("B"))
        .and_then(|b| b.requires(["A"]))
        .expect("Failed to register B");

    let err = a.ready().await.expect_err("cycle must fail");
    match &err {
        ServiceError::CircularDependency { cycle } => {
            let cycle: Vec<_> = cycle.iter().map(ServiceId::as_str).collect();
            assert_eq!(cycle, ["A", "B", "A"]);
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
    assert!(err.is_structural());

    // Still a cycle on every later call, never a partial initialization
    let again = b.ready().await.expect_err("cycle must fail again");
    assert!(matches!(again, ServiceError::CircularDependency { .. }));
    assert_eq!(a.unguarded().initialize_calls(), 0);
    assert_eq!(b.unguarded().initialize_calls(), 0);
    assert_eq!(a.state(), ServiceState::Uninitialized);
}

#[tokio::test]
async fn test_dependency_failure_is_attributed_to_the_dependency() {
    let orchestrator = Orchestrator::new();
    let config = orchestrator
        .register_blocking("Config", MockService::new("Config").fail_with("missing file"))
        .expect("Failed to register Config");
    let db = orchestrator
        .register("Db", MockService::new("Db"))
        .and_then(|db| db.requires(["Config"]))
        .expect("Failed to register Db");
    let users = orchestrator
        .register("Users", MockService::new("Users"))
        .and_then(|users| users.requires(["Db"]))
        .expect("Failed to register Users");

    let err = users.ready().await.expect_err("Config failure must surface");
    let init = err.as_initialization().expect("an initialization error");
    assert_eq!(init.service().as_str(), "Users");
    assert_eq!(init.failed_service().as_str(), "Config");
    assert!(matches!(init.failure(), InitFailure::Initialize(cause) if cause.to_string() == "missing file"));
    assert_eq!(
        err.to_string(),
        "failed to initialize service Users because of Config: initialize() failed: missing file"
    );

    assert_eq!(config.state(), ServiceState::Failed);
    assert_eq!(db.state(), ServiceState::Uninitialized);
    assert_eq!(db.unguarded().initialize_calls(), 0);
    assert_eq!(users.unguarded().initialize_calls(), 0);
}

#[tokio::test]
async fn test_unhealthy_ping_fails_the_service() {
    let orchestrator = Orchestrator::new();
    let cache = orchestrator
        .register("Cache", MockService::new("Cache").unhealthy())
        .expect("Failed to register Cache");

    let err = cache.ready().await.expect_err("unhealthy must fail");
    let init = err.as_initialization().expect("an initialization error");
    assert_eq!(init.failed_service().as_str(), "Cache");
    assert!(matches!(init.failure(), InitFailure::Unhealthy));
    assert_eq!(cache.state(), ServiceState::Failed);
}

#[tokio::test]
async fn test_ping_error_fails_the_service() {
    let orchestrator = Orchestrator::new();
    let cache = orchestrator
        .register_blocking("Cache", MockService::new("Cache").ping_error("timeout"))
        .expect("Failed to register Cache");

    let err = cache.ready().await.expect_err("ping error must fail");
    let init = err.as_initialization().expect("an initialization error");
    assert!(matches!(init.failure(), InitFailure::Ping(cause) if cause.to_string() == "timeout"));
}

#[tokio::test]
async fn test_failed_service_is_not_retried_until_reset() {
    let orchestrator = Orchestrator::new();
    let db = orchestrator
        .register("Db", MockService::new("Db").fail_times(1, "refused"))
        .expect("Failed to register Db");

    let first = db.ready().await.expect_err("first attempt fails");
    let second = db.ready().await.expect_err("failure is sticky");
    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(db.unguarded().initialize_calls(), 1);

    let status = orchestrator.status("Db").expect("Db is known");
    assert_eq!(status.state, ServiceState::Failed);
    assert!(status.last_error.is_some_and(|e| e.contains("refused")));

    assert!(orchestrator.reset("Db"));
    assert_eq!(db.state(), ServiceState::Uninitialized);

    db.ready().await.expect("Failed to ready Db after reset");
    assert_eq!(db.unguarded().initialize_calls(), 2);
    assert!(!orchestrator.reset("Db"));
}

#[tokio::test]
async fn test_dependencies_are_frozen_once_initializing() {
    let log = InitLog::new();
    let (orchestrator, _config, db, _users) = user_stack(&log);

    orchestrator
        .declare("Db", Vec::<ServiceId>::new())
        .expect("Db has not started yet");
    orchestrator
        .declare("Db", ["Config"])
        .expect("Db has not started yet");

    db.ready().await.expect("Failed to ready Db");

    let err = orchestrator
        .declare("Db", ["Users"])
        .expect_err("declaration after initialization");
    assert!(matches!(err, ServiceError::DependenciesFrozen(id) if id.as_str() == "Db"));
    assert_eq!(orchestrator.dependencies_of("Db"), vec![ServiceId::from("Config")]);
}

#[tokio::test]
async fn test_dependencies_added_while_a_request_waits_are_initialized_first() {
    let log = InitLog::new();
    let orchestrator = Orchestrator::new();
    orchestrator
        .register(
            "Slow",
            MockService::new("Slow")
                .delay(Duration::from_millis(200))
                .with_log(&log),
        )
        .expect("Failed to register Slow");
    orchestrator
        .register("Cache", MockService::new("Cache").with_log(&log))
        .expect("Failed to register Cache");
    orchestrator
        .register("Api", MockService::new("Api").with_log(&log))
        .and_then(|api| api.requires(["Slow"]))
        .expect("Failed to register Api");

    let request = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.ensure_ready("Api").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    orchestrator
        .declare("Api", ["Slow", "Cache"])
        .expect("Api has not started yet");

    request
        .await
        .expect("Failed to join request")
        .expect("Failed to ready Api");

    assert_eq!(log.initialized(), ["Slow", "Cache", "Api"]);
    assert_eq!(orchestrator.state("Api"), ServiceState::Ready);
    for dependency in orchestrator.dependencies_of("Api") {
        assert_eq!(orchestrator.state(dependency), ServiceState::Ready);
    }
}

#[tokio::test]
async fn test_unregistered_dependency_fails_before_side_effects() {
    let orchestrator = Orchestrator::new();
    let db = orchestrator
        .register("Db", MockService::new("Db"))
        .and_then(|db| db.requires(["Config"]))
        .expect("Failed to register Db");

    let err = db.ready().await.expect_err("Config has no routine");
    assert!(matches!(err, ServiceError::NotRegistered(id) if id.as_str() == "Config"));
    assert_eq!(db.unguarded().initialize_calls(), 0);

    let err = orchestrator
        .register("Db", MockService::new("Db"))
        .expect_err("second registration");
    assert!(matches!(err, ServiceError::AlreadyRegistered(_)));
}

#[tokio::test]
async fn test_setup_hook_runs_once_and_retries_after_failure() {
    let runs = Arc::new(AtomicUsize::new(0));
    let hook_runs = Arc::clone(&runs);
    let orchestrator = Orchestrator::builder()
        .setup(move || {
            if hook_runs.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("environment not ready".into())
            } else {
                Ok(())
            }
        })
        .build();
    let config = orchestrator
        .register("Config", MockService::new("Config"))
        .expect("Failed to register Config");
    let cache = orchestrator
        .register("Cache", MockService::new("Cache"))
        .expect("Failed to register Cache");

    let err = config.ready().await.expect_err("setup fails first");
    assert!(matches!(err, ServiceError::Setup(_)));
    assert_eq!(config.state(), ServiceState::Uninitialized);

    config.ready().await.expect("Failed to ready Config");
    cache.ready().await.expect("Failed to ready Cache");
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn test_setup_hook_that_requests_a_service_fails_instead_of_deadlocking() {
    let orchestrator = Orchestrator::new();
    let config = orchestrator
        .register_blocking("Config", MockService::new("Config"))
        .expect("Failed to register Config");
    let hook_config = config.downgrade();
    assert!(orchestrator.set_setup(move || {
        hook_config.ready_blocking()?;
        Ok(())
    }));

    let err = config.ready_blocking().expect_err("hook requests Config");
    let ServiceError::Setup(cause) = &err else {
        panic!("expected a setup error, got {err:?}");
    };
    assert!(matches!(
        cause.downcast_ref::<ServiceError>(),
        Some(ServiceError::SetupReentered)
    ));
    assert_eq!(config.state(), ServiceState::Uninitialized);
    assert_eq!(config.unguarded().initialize_calls(), 0);
}

struct Gateway {
    config: ServiceHandle<MockService>,
}

#[async_trait]
impl Service for Gateway {
    async fn initialize(&self) -> Result<(), BoxError> {
        self.config.ready().await?;
        Ok(())
    }
}

#[tokio::test]
async fn test_downgraded_handles_do_not_keep_the_orchestrator_alive() {
    let orchestrator = Orchestrator::new();
    let config = orchestrator
        .register("Config", MockService::new("Config"))
        .expect("Failed to register Config");
    let cache = orchestrator
        .register("Cache", MockService::new("Cache"))
        .expect("Failed to register Cache");
    let gateway = orchestrator
        .register(
            "Gateway",
            Gateway {
                config: config.downgrade(),
            },
        )
        .and_then(|gateway| gateway.requires(["Config"]))
        .expect("Failed to register Gateway");

    gateway.ready().await.expect("Failed to ready Gateway");
    assert!(gateway.unguarded().config.orchestrator().is_some());

    let detached = cache.downgrade();
    drop((orchestrator, config, cache, gateway));

    assert!(detached.orchestrator().is_none());
    let err = detached.ready().await.expect_err("orchestrator is gone");
    assert!(matches!(err, ServiceError::Detached(id) if id.as_str() == "Cache"));
}

#[tokio::test]
async fn test_snapshot_reports_every_service() {
    let log = InitLog::new();
    let (orchestrator, _config, db, _users) = user_stack(&log);

    db.ready().await.expect("Failed to ready Db");

    let snapshot = orchestrator.snapshot();
    let states: Vec<_> = snapshot
        .iter()
        .map(|status| (status.id.as_str(), status.state))
        .collect();
    assert_eq!(
        states,
        [
            ("Config", ServiceState::Ready),
            ("Db", ServiceState::Ready),
            ("Users", ServiceState::Uninitialized),
        ]
    );
    assert_eq!(snapshot[2].dependencies, vec![ServiceId::from("Db")]);
    assert!(snapshot.iter().all(|status| status.last_error.is_none()));
}

#[tokio::test]
async fn test_order_and_cycle_queries() {
    let log = InitLog::new();
    let (orchestrator, _config, _db, _users) = user_stack(&log);

    let order = orchestrator.order("Users").expect("acyclic");
    assert_eq!(
        order,
        vec![ServiceId::from("Config"), ServiceId::from("Db"), ServiceId::from("Users")]
    );
    assert!(orchestrator.detect_cycle("Users").is_ok());
    assert!(log.initialized().is_empty());
}

struct Pool {
    connections: InitCell<Vec<String>>,
}

#[async_trait]
impl Service for Pool {
    async fn initialize(&self) -> Result<(), BoxError> {
        self.connections
            .set(vec!["primary".to_string(), "replica".to_string()])?;
        Ok(())
    }
}

#[tokio::test]
async fn test_init_cell_is_assigned_during_initialize_only() {
    let orchestrator = Orchestrator::new();
    let pool = orchestrator
        .register(
            "Pool",
            Pool {
                connections: InitCell::new("Pool", "connections"),
            },
        )
        .expect("Failed to register Pool");

    let unset = pool.unguarded().connections.get().expect_err("not initialized yet");
    assert!(matches!(unset, ServiceError::UnsetAttribute { .. }));

    let connections = pool
        .call("connections", |pool| pool.connections.get().cloned())
        .await
        .expect("Failed to ready Pool")
        .expect("Connections were set");
    assert_eq!(connections, ["primary", "replica"]);

    let err = pool
        .unguarded()
        .connections
        .set(Vec::new())
        .expect_err("assignment outside initialize()");
    assert!(matches!(err, ServiceError::GuardedAssignment { .. }));
}

struct UserClient {
    handle: ServiceHandle<MockService>,
}

impl Guarded for UserClient {
    type Service = MockService;

    fn handle(&self) -> &ServiceHandle<MockService> {
        &self.handle
    }
}

#[tokio::test]
async fn test_guarded_client_waits_for_the_chain() {
    let log = InitLog::new();
    let (_orchestrator, _config, _db, users) = user_stack(&log);
    let client = UserClient { handle: users };

    let service = client.ready().await.expect("Failed to ready Users");
    assert_eq!(service.id().as_str(), "Users");
    assert_eq!(log.initialized(), ["Config", "Db", "Users"]);
}
