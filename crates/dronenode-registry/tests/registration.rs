use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dronenode_registry::description::{describe, thing_id};
use dronenode_registry::{
    Announced, AuthService, CredentialConfig, CredentialManager, DirectoryService, Registrar, RegistrationLoop,
    ServiceError,
};
use serde_json::Value;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
struct Call {
    at: Instant,
    method: &'static str,
    token: Option<String>,
}

/// Scripted directory: each queue entry is the status to answer with; empty queues accept.
#[derive(Default)]
struct FakeDirectory {
    upserts: Mutex<VecDeque<u16>>,
    creates: Mutex<VecDeque<u16>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeDirectory {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn methods(&self) -> Vec<&'static str> {
        self.calls().into_iter().map(|c| c.method).collect()
    }

    fn answer(&self, method: &'static str, queue: &Mutex<VecDeque<u16>>, ok: u16, token: Option<&str>) -> Result<u16, ServiceError> {
        self.calls.lock().unwrap().push(Call { at: Instant::now(), method, token: token.map(str::to_string) });
        let url = "http://zion/things".to_string();
        match queue.lock().unwrap().pop_front().unwrap_or(ok) {
            401 => Err(ServiceError::Unauthorized { url }),
            s if (200..300).contains(&s) => Ok(s),
            status => Err(ServiceError::Status { url, status, body: "nope".into() }),
        }
    }
}

#[async_trait]
impl DirectoryService for FakeDirectory {
    async fn upsert(&self, id: &str, _description: &Value, token: Option<&str>) -> Result<u16, ServiceError> {
        assert_eq!(id, "urn:dev:ops:drone:1");
        self.answer("PUT", &self.upserts, 204, token)
    }

    async fn create(&self, _description: &Value, token: Option<&str>) -> Result<u16, ServiceError> {
        self.answer("POST", &self.creates, 201, token)
    }
}

#[derive(Default)]
struct CountingAuth {
    logins: Mutex<u32>,
}

#[async_trait]
impl AuthService for CountingAuth {
    async fn login(&self, _email: &str, _password: &str) -> Result<String, ServiceError> {
        let mut n = self.logins.lock().unwrap();
        *n += 1;
        Ok(format!("token-{n}"))
    }

    async fn register(&self, _email: &str, _password: &str) -> Result<String, ServiceError> {
        Err(ServiceError::Status { url: "http://zion/auth/register".into(), status: 409, body: String::new() })
    }
}

fn credentials(auth: Arc<CountingAuth>, with_login: bool) -> Arc<CredentialManager> {
    CredentialManager::new(
        auth,
        CredentialConfig {
            email: if with_login { "drone@example.org".into() } else { String::new() },
            password: if with_login { "secret".into() } else { String::new() },
            refresh_margin: Duration::from_secs(60),
            min_refresh_delay: Duration::from_secs(5),
        },
    )
}

fn registrar(dir: Arc<FakeDirectory>, creds: Arc<CredentialManager>) -> Registrar {
    let td = describe("drone1", 1, ["armed"], ["arm"]);
    Registrar::new(dir, creds, thing_id(1), td)
}

fn registration_loop(dir: Arc<FakeDirectory>, creds: Arc<CredentialManager>) -> RegistrationLoop {
    RegistrationLoop::new(registrar(dir, creds), Duration::from_secs(3), Duration::from_secs(300))
}

#[tokio::test]
async fn upsert_success_is_a_replace() {
    let dir = Arc::new(FakeDirectory::default());
    let r = registrar(dir.clone(), credentials(Arc::new(CountingAuth::default()), false));
    assert_eq!(r.announce().await.unwrap(), Announced::Replaced(204));
    assert_eq!(dir.methods(), ["PUT"]);
    assert_eq!(dir.calls()[0].token, None);
}

#[tokio::test]
async fn rejected_upsert_falls_back_to_create() {
    let dir = Arc::new(FakeDirectory::default());
    dir.upserts.lock().unwrap().push_back(405);
    let r = registrar(dir.clone(), credentials(Arc::new(CountingAuth::default()), false));
    assert_eq!(r.announce().await.unwrap(), Announced::Created(201));
    assert_eq!(dir.methods(), ["PUT", "POST"]);
}

#[tokio::test]
async fn logs_in_before_first_upsert() {
    let dir = Arc::new(FakeDirectory::default());
    let auth = Arc::new(CountingAuth::default());
    let r = registrar(dir.clone(), credentials(auth.clone(), true));
    r.announce().await.unwrap();
    assert_eq!(*auth.logins.lock().unwrap(), 1);
    assert_eq!(dir.calls()[0].token.as_deref(), Some("token-1"));
}

#[tokio::test]
async fn unauthorized_upsert_relogs_and_retries_once() {
    let dir = Arc::new(FakeDirectory::default());
    dir.upserts.lock().unwrap().push_back(401);
    let auth = Arc::new(CountingAuth::default());
    let r = registrar(dir.clone(), credentials(auth.clone(), true));

    assert_eq!(r.announce().await.unwrap(), Announced::Replaced(204));
    let calls = dir.calls();
    assert_eq!(dir.methods(), ["PUT", "PUT"]);
    assert_eq!(calls[0].token.as_deref(), Some("token-1"));
    assert_eq!(calls[1].token.as_deref(), Some("token-2"));
    assert_eq!(*auth.logins.lock().unwrap(), 2);
}

#[tokio::test]
async fn second_unauthorized_upsert_falls_back_to_create() {
    let dir = Arc::new(FakeDirectory::default());
    dir.upserts.lock().unwrap().extend([401, 401]);
    let r = registrar(dir.clone(), credentials(Arc::new(CountingAuth::default()), true));

    assert_eq!(r.announce().await.unwrap(), Announced::Created(201));
    assert_eq!(dir.methods(), ["PUT", "PUT", "POST"]);
}

#[tokio::test]
async fn unauthorized_without_credentials_skips_the_retry() {
    let dir = Arc::new(FakeDirectory::default());
    dir.upserts.lock().unwrap().push_back(401);
    dir.creates.lock().unwrap().push_back(401);
    let r = registrar(dir.clone(), credentials(Arc::new(CountingAuth::default()), false));

    assert!(r.announce().await.unwrap_err().is_unauthorized());
    assert_eq!(dir.methods(), ["PUT", "POST"]);
}

#[tokio::test(start_paused = true)]
async fn retries_at_the_fixed_interval_until_success() {
    let dir = Arc::new(FakeDirectory::default());
    dir.upserts.lock().unwrap().extend([500, 500]);
    dir.creates.lock().unwrap().extend([500, 500]);
    let start = Instant::now();
    let task = tokio::spawn(registration_loop(dir.clone(), credentials(Arc::new(CountingAuth::default()), false)).run());

    tokio::time::sleep(Duration::from_millis(2900)).await;
    assert_eq!(dir.methods(), ["PUT", "POST"]);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(dir.methods(), ["PUT", "POST", "PUT", "POST"]);
    let calls = dir.calls();
    assert!(calls[2].at - calls[0].at >= Duration::from_secs(3));

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(dir.methods().len(), 5);
    assert!(dir.calls()[4].at - start >= Duration::from_secs(6));
    task.abort();
}

#[tokio::test(start_paused = true)]
async fn reannounces_only_after_the_period() {
    let dir = Arc::new(FakeDirectory::default());
    let task = tokio::spawn(registration_loop(dir.clone(), credentials(Arc::new(CountingAuth::default()), false)).run());

    tokio::time::sleep(Duration::from_secs(299)).await;
    assert_eq!(dir.methods(), ["PUT"]);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(dir.methods(), ["PUT", "PUT"]);
    task.abort();
}

#[tokio::test(start_paused = true)]
async fn periodic_failures_are_swallowed() {
    let dir = Arc::new(FakeDirectory::default());
    let task = tokio::spawn(registration_loop(dir.clone(), credentials(Arc::new(CountingAuth::default()), false)).run());
    tokio::time::sleep(Duration::from_secs(1)).await;

    dir.upserts.lock().unwrap().push_back(500);
    dir.creates.lock().unwrap().push_back(500);
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(dir.methods(), ["PUT", "PUT", "POST"]);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(dir.methods(), ["PUT", "PUT", "POST", "PUT"]);
    assert!(!task.is_finished());
    task.abort();
}
