// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use settlement_core::{
  CaptureRequest, DisbursementRequest, GatewayOutcome, InMemoryDirectory, MemoryLedgerStore, Notification,
  NotificationSink, Order, OrderLine, PaymentGateway, PaymentMethod, PaymentResult, ProductListing, SellerAccount,
  SettlementConfig, SettlementService,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use uuid::Uuid;

// --- Helper for Tracing Setup ---
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Gateway whose answers the test decides ---
#[derive(Debug)]
pub struct ScriptedGateway {
  approve_capture: AtomicBool,
  approve_disbursement: AtomicBool,
  pub captures: AtomicUsize,
  pub disbursements: AtomicUsize,
  latency: Duration,
}

impl ScriptedGateway {
  pub fn approving() -> Self {
    Self {
      approve_capture: AtomicBool::new(true),
      approve_disbursement: AtomicBool::new(true),
      captures: AtomicUsize::new(0),
      disbursements: AtomicUsize::new(0),
      latency: Duration::from_millis(5),
    }
  }

  pub fn set_capture(&self, approve: bool) {
    self.approve_capture.store(approve, Ordering::SeqCst);
  }

  pub fn set_disbursement(&self, approve: bool) {
    self.approve_disbursement.store(approve, Ordering::SeqCst);
  }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
  fn name(&self) -> &str {
    "SCRIPTED"
  }

  async fn capture(&self, _request: &CaptureRequest) -> anyhow::Result<GatewayOutcome> {
    self.captures.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(self.latency).await;
    Ok(if self.approve_capture.load(Ordering::SeqCst) {
      GatewayOutcome::Approved {
        response: "Payment processed successfully".into(),
      }
    } else {
      GatewayOutcome::Declined {
        reason: "Payment processing failed".into(),
      }
    })
  }

  async fn disburse(&self, _request: &DisbursementRequest) -> anyhow::Result<GatewayOutcome> {
    self.disbursements.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(self.latency).await;
    Ok(if self.approve_disbursement.load(Ordering::SeqCst) {
      GatewayOutcome::Approved {
        response: "Payout sent".into(),
      }
    } else {
      GatewayOutcome::Declined {
        reason: "Payout processing failed".into(),
      }
    })
  }
}

// --- Notifier that remembers what it was asked to send ---
#[derive(Debug, Default)]
pub struct RecordingNotifier {
  sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
  pub fn titles_for(&self, user_id: Uuid) -> Vec<String> {
    self
      .sent
      .lock()
      .iter()
      .filter(|n| n.user_id == user_id)
      .map(|n| n.title.clone())
      .collect()
  }

  pub fn count(&self) -> usize {
    self.sent.lock().len()
  }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
  async fn notify(&self, notification: Notification) -> anyhow::Result<()> {
    self.sent.lock().push(notification);
    Ok(())
  }
}

// --- Notifier whose every delivery fails ---
#[derive(Debug, Default)]
pub struct FailingNotifier {
  pub attempts: AtomicUsize,
}

#[async_trait]
impl NotificationSink for FailingNotifier {
  async fn notify(&self, _notification: Notification) -> anyhow::Result<()> {
    self.attempts.fetch_add(1, Ordering::SeqCst);
    anyhow::bail!("notification service unavailable")
  }
}

// --- Marketplace fixture: one buyer, two sellers, a product each ---
pub struct Market {
  pub service: Arc<SettlementService>,
  pub store: Arc<MemoryLedgerStore>,
  pub gateway: Arc<ScriptedGateway>,
  pub notifier: Arc<RecordingNotifier>,
  pub directory: Arc<InMemoryDirectory>,
  pub buyer: Uuid,
  pub seller_x: Uuid,
  pub seller_y: Uuid,
}

pub fn test_config() -> SettlementConfig {
  SettlementConfig {
    commission_rate: dec!(10.00),
    gateway_timeout: Duration::from_secs(2),
    gateway_latency: Duration::ZERO,
    ..SettlementConfig::default()
  }
}

impl Market {
  pub fn new() -> Self {
    Self::with_config(test_config())
  }

  pub fn with_config(config: SettlementConfig) -> Self {
    Self::assemble(config, None)
  }

  /// A market whose notification sink rejects everything it is given.
  pub fn with_failing_notifier() -> (Self, Arc<FailingNotifier>) {
    let failing = Arc::new(FailingNotifier::default());
    let sink: Arc<dyn NotificationSink> = failing.clone();
    (Self::assemble(test_config(), Some(sink)), failing)
  }

  fn assemble(config: SettlementConfig, sink: Option<Arc<dyn NotificationSink>>) -> Self {
    setup_tracing();
    let store = Arc::new(MemoryLedgerStore::new());
    let gateway = Arc::new(ScriptedGateway::approving());
    let notifier = Arc::new(RecordingNotifier::default());
    let sink = sink.unwrap_or_else(|| notifier.clone() as Arc<dyn NotificationSink>);
    let directory = Arc::new(InMemoryDirectory::new());

    let buyer = Uuid::new_v4();
    let seller_x = Uuid::new_v4();
    let seller_y = Uuid::new_v4();
    directory.add_user(buyer, "Buyer");
    directory.add_seller(SellerAccount {
      user_id: seller_x,
      display_name: "Seller X".into(),
      default_payout_method: Some("PAYPAL".into()),
    });
    directory.add_seller(SellerAccount {
      user_id: seller_y,
      display_name: "Seller Y".into(),
      default_payout_method: None,
    });

    let service = SettlementService::new(
      store.clone(),
      gateway.clone(),
      sink,
      directory.clone(),
      config,
    )
    .expect("test service builds");

    Self {
      service: Arc::new(service),
      store,
      gateway,
      notifier,
      directory,
      buyer,
      seller_x,
      seller_y,
    }
  }

  pub fn listing(&self, seller_id: Uuid, price: Decimal) -> Uuid {
    let id = Uuid::new_v4();
    self.directory.add_product(ProductListing {
      id,
      seller_id,
      title: format!("Item {price}"),
      price,
      active: true,
    });
    id
  }

  /// Places a one-line order for a fresh listing of `price` from `seller_id`.
  pub async fn order_from(&self, seller_id: Uuid, price: Decimal) -> Order {
    let product_id = self.listing(seller_id, price);
    self
      .service
      .place_order(self.buyer, vec![OrderLine { product_id, quantity: 1 }])
      .await
      .expect("order placed")
  }

  /// An order worth $100.00: $66.67 from seller X and $33.33 from seller Y.
  pub async fn split_order(&self) -> Order {
    let x = self.listing(self.seller_x, dec!(66.67));
    let y = self.listing(self.seller_y, dec!(33.33));
    self
      .service
      .place_order(
        self.buyer,
        vec![
          OrderLine { product_id: x, quantity: 1 },
          OrderLine { product_id: y, quantity: 1 },
        ],
      )
      .await
      .expect("order placed")
  }

  pub async fn pay(&self, order: &Order) -> PaymentResult {
    self
      .service
      .capture(order.id, self.buyer, PaymentMethod::CreditCard)
      .await
      .expect("capture runs")
  }

  /// Gives `seller_id` exactly 90% of `price` in pending earnings.
  pub async fn earn(&self, seller_id: Uuid, price: Decimal) -> PaymentResult {
    let order = self.order_from(seller_id, price).await;
    self.pay(&order).await
  }
}
