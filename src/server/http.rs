//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. One accept loop,
//! one spawned task per connection, shared state behind an Arc.

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::JwtKeys;
use crate::billing::StripeClient;
use crate::config::Args;
use crate::db::Db;
use crate::error::{AtelierError, Result};
use crate::mentor::{MentorBackend, OpenAiBackend};
use crate::routes::{self, BoxBody};

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub db: Db,
    pub jwt: JwtKeys,
    /// Mentor backend; None disables the feature (soft unavailable)
    pub mentor: Option<Arc<dyn MentorBackend>>,
    /// Stripe client; None disables billing routes
    pub stripe: Option<StripeClient>,
}

impl AppState {
    pub fn new(args: Args, db: Db) -> Result<Self> {
        let secret = match &args.jwt_secret {
            Some(secret) => secret.clone(),
            None if args.dev_mode => {
                warn!("DEV_MODE: using an ephemeral JWT secret, tokens die with the process");
                rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(48)
                    .map(char::from)
                    .collect()
            }
            None => {
                return Err(AtelierError::Config(
                    "JWT_SECRET is required outside dev mode".into(),
                ));
            }
        };
        let jwt = JwtKeys::new(&secret, args.jwt_expiry_seconds);

        let mentor: Option<Arc<dyn MentorBackend>> = match &args.mentor_base_url {
            Some(base_url) => {
                let backend = OpenAiBackend::new(
                    base_url.clone(),
                    args.mentor_model.clone(),
                    args.mentor_api_key.clone(),
                )
                .map_err(|e| AtelierError::Config(e.to_string()))?;
                info!(model = %args.mentor_model, "mentor backend configured");
                Some(Arc::new(backend))
            }
            None => {
                info!("no mentor backend configured, advice disabled");
                None
            }
        };

        let stripe = args.stripe_secret_key.as_ref().map(|key| {
            info!("stripe billing configured");
            StripeClient::new(key.clone())
        });

        Ok(Self {
            args,
            db,
            jwt,
            mentor,
            stripe,
        })
    }
}

pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("Atelier listening on {}", state.args.listen);
    if state.args.dev_mode {
        warn!("Development mode enabled");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("[{}] {} {}", addr, method, path);

    if method == Method::OPTIONS {
        return Ok(routes::cors_preflight());
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let response = match (&method, segments.as_slice()) {
        (&Method::GET, ["health"]) | (&Method::GET, ["healthz"]) => {
            routes::health::health_check(state)
        }
        (&Method::GET, ["version"]) => routes::health::version_info(),

        (&Method::POST, ["auth", "register"]) => {
            routes::auth_routes::handle_register(req, state).await
        }
        (&Method::POST, ["auth", "login"]) => routes::auth_routes::handle_login(req, state).await,
        (&Method::GET, ["auth", "me"]) => routes::auth_routes::handle_me(req, state).await,

        (&Method::GET, ["feed"]) => routes::feed_routes::handle_feed(req, state).await,
        (&Method::GET, ["feed", "discovery"]) => {
            routes::feed_routes::handle_discovery(req, state).await
        }

        (&Method::POST, ["processes"]) => routes::process_routes::handle_create(req, state).await,
        (&Method::GET, ["processes", id]) => {
            let id = id.to_string();
            routes::process_routes::handle_get(req, state, &id).await
        }
        (&Method::PATCH, ["processes", id]) => {
            let id = id.to_string();
            routes::process_routes::handle_autosave(req, state, &id).await
        }
        (&Method::DELETE, ["processes", id]) => {
            let id = id.to_string();
            routes::process_routes::handle_delete(req, state, &id).await
        }
        (&Method::POST, ["processes", id, "publish"]) => {
            let id = id.to_string();
            routes::process_routes::handle_publish(req, state, &id).await
        }
        (&Method::POST, ["processes", id, "resonance"]) => {
            let id = id.to_string();
            routes::process_routes::handle_resonance_toggle(req, state, &id).await
        }
        (&Method::GET, ["processes", id, "resonances"]) => {
            let id = id.to_string();
            routes::process_routes::handle_resonance_status(req, state, &id).await
        }
        (&Method::POST, ["processes", id, "feedback"]) => {
            let id = id.to_string();
            routes::process_routes::handle_add_feedback(req, state, &id).await
        }
        (&Method::GET, ["processes", id, "feedback"]) => {
            let id = id.to_string();
            routes::process_routes::handle_list_feedback(req, state, &id).await
        }
        (&Method::GET, ["processes", id, "mentor"]) => {
            let id = id.to_string();
            routes::mentor_routes::handle_mentor(req, state, &id).await
        }

        (&Method::POST, ["conversations"]) => {
            routes::messaging_routes::handle_create(req, state).await
        }
        (&Method::GET, ["conversations"]) => {
            routes::messaging_routes::handle_list(req, state).await
        }
        (&Method::GET, ["conversations", id]) => {
            let id = id.to_string();
            routes::messaging_routes::handle_get(req, state, &id).await
        }
        (&Method::POST, ["conversations", id, "messages"]) => {
            let id = id.to_string();
            routes::messaging_routes::handle_send(req, state, &id).await
        }

        (&Method::PATCH, ["profile"]) => routes::profile_routes::handle_update(req, state).await,
        (&Method::POST, ["profile", "state"]) => {
            routes::profile_routes::handle_set_state(req, state).await
        }
        (&Method::GET, ["profiles", "search"]) => {
            routes::profile_routes::handle_search(req, state).await
        }
        (&Method::GET, ["profiles", id]) => {
            let id = id.to_string();
            routes::profile_routes::handle_get(req, state, &id).await
        }
        (&Method::POST, ["profiles", id, "follow"]) => {
            let id = id.to_string();
            routes::profile_routes::handle_follow(req, state, &id).await
        }
        (&Method::DELETE, ["profiles", id, "follow"]) => {
            let id = id.to_string();
            routes::profile_routes::handle_unfollow(req, state, &id).await
        }
        (&Method::GET, ["profiles", id, "follow"]) => {
            let id = id.to_string();
            routes::profile_routes::handle_follow_status(req, state, &id).await
        }

        (&Method::POST, ["moderation", "block"]) => {
            routes::moderation_routes::handle_block(req, state).await
        }
        (&Method::POST, ["moderation", "report"]) => {
            routes::moderation_routes::handle_report(req, state).await
        }

        (&Method::POST, ["coprocesses"]) => {
            routes::coprocess_routes::handle_create(req, state).await
        }
        (&Method::GET, ["coprocesses", id]) => {
            let id = id.to_string();
            routes::coprocess_routes::handle_get(req, state, &id).await
        }
        (&Method::POST, ["coprocesses", id, "entries"]) => {
            let id = id.to_string();
            routes::coprocess_routes::handle_add_entry(req, state, &id).await
        }
        (&Method::POST, ["coprocesses", id, "invite"]) => {
            let id = id.to_string();
            routes::coprocess_routes::handle_invite(req, state, &id).await
        }
        (&Method::POST, ["coprocesses", id, "close"]) => {
            let id = id.to_string();
            routes::coprocess_routes::handle_close(req, state, &id).await
        }
        (&Method::POST, ["coprocess-entries", id, "feedback"]) => {
            let id = id.to_string();
            routes::coprocess_routes::handle_entry_feedback(req, state, &id).await
        }

        (&Method::POST, ["billing", "checkout"]) => {
            routes::billing_routes::handle_checkout(req, state).await
        }
        (&Method::POST, ["billing", "portal"]) => {
            routes::billing_routes::handle_portal(req, state).await
        }
        (&Method::POST, ["webhooks", "stripe"]) => {
            routes::billing_routes::handle_webhook(req, state).await
        }

        _ => routes::not_found(&path),
    };

    Ok(response)
}
