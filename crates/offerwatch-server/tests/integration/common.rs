use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use tokio_util::sync::CancellationToken;

use offerwatch_core::models::Source;
use offerwatch_core::monitor::{CommandHandler, Monitor, MonitorState};
use offerwatch_core::notify::NotificationBatcher;
use offerwatch_core::registry::{SourceRegistry, SubscriberRegistry};
use offerwatch_core::scheduler::{Scheduler, SchedulerHandle, SweepSchedule};
use offerwatch_core::sweep::SweepService;
use offerwatch_core::testutil::{MockDispatcher, MockFetcher, MockMarkup, MockReporter, deal};
use offerwatch_core::throttle::ThrottleConfig;
use offerwatch_core::traits::NullStore;
use offerwatch_server::auth::line_signature;
use offerwatch_server::routes;
use offerwatch_server::state::AppState;

pub const TEST_ADMIN_TOKEN: &str = "test-admin-token";
pub const TEST_CHANNEL_SECRET: &str = "test-channel-secret";

pub struct TestApp {
    pub router: Router,
    pub dispatcher: MockDispatcher,
    pub scheduler: SchedulerHandle,
    pub cancel: CancellationToken,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// App with two sources whose pages always carry one "Summer Deal" offer.
pub fn setup_test_app() -> TestApp {
    build(Some(TEST_ADMIN_TOKEN.to_string()))
}

/// App without an admin token configured.
pub fn setup_test_app_no_auth() -> TestApp {
    build(None)
}

fn build(admin_token: Option<String>) -> TestApp {
    let state = Arc::new(MonitorState::new(
        SourceRegistry::from_sources([
            Source::new("台南晶英酒店", "https://tainan.silksplace.com/"),
            Source::new("康橋商旅", "https://www.kindness-hotel.com.tw/"),
        ]),
        SubscriberRegistry::new(),
    ));
    let dispatcher = MockDispatcher::new();

    let sweep = SweepService::new(
        MockFetcher::new("<html></html>"),
        MockMarkup::repeating(vec![deal("Summer Deal", "$100")]),
    )
    .with_throttle(ThrottleConfig::none());
    let monitor = Monitor::new(
        state.clone(),
        sweep,
        dispatcher.clone(),
        NullStore,
        NotificationBatcher::new(chrono_tz::Asia::Taipei),
    );

    let (scheduler, handle) =
        Scheduler::new(monitor, SweepSchedule::manual_only(chrono_tz::Asia::Taipei));
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        scheduler.run(token, &MockReporter::new()).await;
    });

    let app_state = Arc::new(AppState {
        handler: CommandHandler::new(state, handle.clone()),
        dispatcher: dispatcher.clone(),
        channel_secret: TEST_CHANNEL_SECRET.to_string(),
        admin_token,
    });

    TestApp {
        router: routes::router(app_state),
        dispatcher,
        scheduler: handle,
        cancel,
    }
}

/// A LINE text message webhook request, signed with the test secret.
pub fn signed_text_event(user_id: &str, reply_token: &str, text: &str) -> Request<Body> {
    let body = serde_json::json!({
        "destination": "Ubot",
        "events": [{
            "type": "message",
            "replyToken": reply_token,
            "source": {"type": "user", "userId": user_id},
            "message": {"type": "text", "id": "1", "text": text}
        }]
    })
    .to_string();
    signed_request(body)
}

pub fn signed_request(body: String) -> Request<Body> {
    let signature = line_signature(TEST_CHANNEL_SECRET, body.as_bytes()).unwrap();
    Request::post("/webhook")
        .header("content-type", "application/json")
        .header("x-line-signature", signature)
        .body(Body::from(body))
        .unwrap()
}
