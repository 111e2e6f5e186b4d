use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use redelivery_engine::{
    ConsumerConfig, ConsumerHandle, Deduplicate, EngineResult, Publisher, RetryingConsumer,
    SharedStats,
};
use redelivery_log::{JsonCodec, RecordLog};
use redelivery_users::{IpDenylist, User, UserDeadLetterHandler, UserEventHandler};

pub const ENV_HTTP_ADDR: &str = "REDELIVERY_HTTP_ADDR";
pub const ENV_USERS_CSV: &str = "REDELIVERY_USERS_CSV";
pub const ENV_DENYLIST: &str = "REDELIVERY_DENYLIST";

/// API-level settings (the consumer has its own [`ConsumerConfig`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub http_addr: String,
    pub users_csv: PathBuf,
    pub denylist: IpDenylist,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_string(),
            users_csv: PathBuf::from("users.csv"),
            denylist: IpDenylist::default(),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            http_addr: lookup(ENV_HTTP_ADDR).unwrap_or(defaults.http_addr),
            users_csv: lookup(ENV_USERS_CSV)
                .map(PathBuf::from)
                .unwrap_or(defaults.users_csv),
            denylist: match lookup(ENV_DENYLIST) {
                Some(raw) => IpDenylist::parse(&raw),
                None => {
                    warn!("{ENV_DENYLIST} not set; using built-in denylist");
                    defaults.denylist
                }
            },
        }
    }
}

/// Everything the HTTP handlers need.
#[derive(Clone)]
pub struct ProducerServices {
    pub subject: String,
    pub publisher: Publisher<User>,
    pub users_csv: PathBuf,
    pub dead_letters: UserDeadLetterHandler,
    pub stats: SharedStats,
}

/// Start the user-event consumer on `log` and wire the producer side to the same log.
///
/// The returned handle keeps the consumer running; drop or shut it down to stop it.
pub async fn start<L>(
    consumer: ConsumerConfig,
    api: &ApiConfig,
    log: Arc<L>,
) -> EngineResult<(ProducerServices, ConsumerHandle)>
where
    L: RecordLog + 'static,
{
    let dead_letters = UserDeadLetterHandler::new();
    let subject = consumer.subject.clone();

    info!(
        subject = %subject,
        denylist = ?api.denylist.entries(),
        users_csv = %api.users_csv.display(),
        "wiring user-event services"
    );

    let handle = RetryingConsumer::<User>::new(consumer, log.clone(), JsonCodec)
        .handler(UserEventHandler::new(api.denylist.clone()))
        .dead_letter_handler(Deduplicate::new(dead_letters.clone()))
        .start()
        .await?;

    let services = ProducerServices {
        subject,
        publisher: Publisher::new(log, JsonCodec),
        users_csv: api.users_csv.clone(),
        dead_letters,
        stats: handle.shared_stats(),
    };
    Ok((services, handle))
}
