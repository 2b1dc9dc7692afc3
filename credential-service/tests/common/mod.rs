use credential_service::{
    config::{CredentialConfig, DatabaseConfig, Environment, JwtConfig, RateLimitConfig, SecurityConfig},
    models::{Role, User},
    services::{AuditTrail, JwtSigner, MemoryDirectory, TokenIssuer},
    store::MemoryStore,
    utils::{hash_password, Password},
    AppState,
};
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use std::sync::Arc;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "correct horse battery staple";

pub struct TestContext {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub directory: Arc<MemoryDirectory>,
    pub jwt: JwtSigner,
    pub tenant_id: Uuid,
}

pub fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "integration-test-secret-0123456789abcdef".to_string(),
        access_token_expiry_minutes: 15,
        refresh_token_expiry_days: 7,
        max_session_hours: 720,
    }
}

pub fn build_context(jwt_config: JwtConfig) -> TestContext {
    let config = CredentialConfig {
        common: service_core::config::Config { port: 8080 },
        environment: Environment::Dev,
        service_name: "credential-service".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 1,
        },
        jwt: jwt_config.clone(),
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        swagger_enabled: false,
        rate_limit: RateLimitConfig {
            login_attempts: 1000,
            login_window_seconds: 60,
            global_ip_limit: 10_000,
            global_ip_window_seconds: 60,
        },
    };

    let store = Arc::new(MemoryStore::new());
    let directory = Arc::new(MemoryDirectory::new());
    let jwt = JwtSigner::new(&jwt_config);
    let audit = AuditTrail::new(store.clone());
    let issuer = TokenIssuer::new(
        store.clone(),
        jwt.clone(),
        audit.clone(),
        jwt_config.max_session_hours,
    );

    let state = AppState {
        config,
        store: store.clone(),
        directory: directory.clone(),
        jwt: jwt.clone(),
        issuer,
        audit,
        login_rate_limiter: create_ip_rate_limiter(1000, 60),
        ip_rate_limiter: create_ip_rate_limiter(10_000, 60),
    };

    TestContext {
        state,
        store,
        directory,
        jwt,
        tenant_id: Uuid::new_v4(),
    }
}

pub fn context() -> TestContext {
    build_context(test_jwt_config())
}

pub fn seed_user(ctx: &TestContext, role: Role, email: &str) -> User {
    let hash = hash_password(&Password::new(TEST_PASSWORD.to_string()))
        .expect("Failed to hash test password");
    let user = User::new(
        ctx.tenant_id,
        email.to_string(),
        hash.into_string(),
        Some("Test User".to_string()),
        role,
    );
    ctx.directory.insert(user.clone());
    user
}
