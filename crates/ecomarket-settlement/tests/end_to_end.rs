//! End-to-end tests: checkout -> payment -> fulfillment -> payout sweep.
//!
//! These drive the real services against one shared store and check the
//! money side: seller and platform balances, ledger rows, idempotency of
//! repeated and concurrent sweeps, and supply conservation.

use std::{sync::Arc, time::Duration};

use ecomarket_ledger::{Ledger, verify_supply};
use ecomarket_orders::{CheckoutService, OrderLifecycle};
use ecomarket_settlement::{PayoutEngine, PayoutOutcome, PayoutScheduler};
use ecomarket_store::MarketStore;
use ecomarket_types::*;
use rand::Rng;
use rust_decimal::Decimal;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Helper: a marketplace with one platform wallet and any number of sellers.
struct Market {
    store: Arc<MarketStore>,
    directory: SellerDirectory,
    catalog: CatalogIndex,
    ledger: Ledger,
    platform: WalletId,
    customer: UserId,
}

impl Market {
    fn new(platform_funds: &str) -> Self {
        let store = Arc::new(MarketStore::new());
        let ledger = Ledger::new(Arc::clone(&store));
        let platform = WalletId::new();
        ledger.ensure_platform_wallet(platform).unwrap();
        let funds = dec(platform_funds);
        if funds > Decimal::ZERO {
            ledger.deposit(platform, funds, "captured payments").unwrap();
        }
        Self {
            store,
            directory: SellerDirectory::new(),
            catalog: CatalogIndex::new(),
            ledger,
            platform,
            customer: UserId::new(),
        }
    }

    /// Register a seller. Returns the seller and, if `with_wallet`, its wallet.
    fn seller(&mut self, seller: Seller, with_wallet: bool) -> (UserId, Option<WalletId>) {
        let user = UserId::new();
        self.directory.link(seller, user);
        let wallet = with_wallet.then(|| self.ledger.open_wallet(user).unwrap());
        (user, wallet)
    }

    fn checkout(&self) -> CheckoutService {
        CheckoutService::new(
            Arc::clone(&self.store),
            Arc::new(self.catalog.clone()),
            Arc::new(self.directory.clone()),
            CheckoutConfig::default(),
        )
    }

    fn lifecycle(&self) -> OrderLifecycle {
        OrderLifecycle::new(Arc::clone(&self.store))
    }

    fn engine(&self) -> PayoutEngine {
        PayoutEngine::new(
            Arc::clone(&self.store),
            Arc::new(self.directory.clone()),
            SettlementConfig::new(self.platform),
        )
    }

    /// Check out one design line and walk the order to delivered.
    fn delivered_order(&mut self, designer: Seller, price: &str) -> OrderId {
        let design = DesignId::new();
        self.catalog.add_design(design);
        let request = CreateSessionRequest {
            shipping_address: "9 Willow Row".into(),
            hold_minutes: 0,
            items: vec![CartItem::design(designer, design, 1, dec(price))],
        };
        let session = self.checkout().create_session(self.customer, &request).unwrap();
        let order_id = session.orders[0].order_id;
        let lifecycle = self.lifecycle();
        lifecycle.confirm_payment(order_id).unwrap();
        lifecycle.mark_shipped(order_id).unwrap();
        lifecycle.mark_delivered(order_id).unwrap();
        order_id
    }

    fn order(&self, id: OrderId) -> Order {
        self.store.read(|t| t.order(id).cloned()).unwrap().unwrap()
    }

    fn balance(&self, wallet: WalletId) -> Decimal {
        self.ledger.balance(wallet).unwrap()
    }
}

#[test]
fn delivered_order_pays_seller_ninety_percent() {
    let mut m = Market::new("1000");
    let designer = Seller::designer(SellerId::new());
    let (_, wallet) = m.seller(designer, true);
    let seller_wallet = wallet.unwrap();
    let order_id = m.delivered_order(designer, "100");

    let report = m.engine().sweep().unwrap();
    assert_eq!(report.examined, 1);
    assert_eq!(report.paid.len(), 1);
    assert_eq!(report.paid[0].split.fee, dec("10"));
    assert_eq!(report.total_moved, dec("90"));
    assert!(report.skipped.is_empty());

    assert_eq!(m.balance(m.platform), dec("910"));
    assert_eq!(m.balance(seller_wallet), dec("90"));
    assert!(m.order(order_id).is_paid_out());

    let platform_rows = m.ledger.history(m.platform).unwrap();
    let seller_rows = m.ledger.history(seller_wallet).unwrap();
    assert_eq!(platform_rows.len(), 2, "deposit plus the payout debit");
    assert_eq!(seller_rows.len(), 1);
    let debit = &platform_rows[1];
    let credit = &seller_rows[0];
    assert_eq!(debit.tx_type, TransactionType::Transfer);
    assert_eq!(debit.amount, dec("-90"));
    assert_eq!(debit.balance_before, dec("1000"));
    assert_eq!(debit.balance_after, dec("910"));
    assert_eq!(credit.amount, dec("90"));
    assert_eq!(credit.balance_before, Decimal::ZERO);
    assert_eq!(credit.balance_after, dec("90"));
    assert_eq!(debit.description, credit.description);

    m.ledger.verify_chain(m.platform).unwrap();
    m.ledger.verify_chain(seller_wallet).unwrap();
    verify_supply(&m.store).unwrap();
}

#[test]
fn second_sweep_pays_nothing() {
    let mut m = Market::new("500");
    let designer = Seller::designer(SellerId::new());
    let (_, wallet) = m.seller(designer, true);
    let order_id = m.delivered_order(designer, "200");
    let engine = m.engine();

    assert_eq!(engine.sweep().unwrap().paid.len(), 1);
    let again = engine.sweep().unwrap();
    assert_eq!(again.examined, 0);
    assert!(again.paid.is_empty());
    assert_eq!(engine.payout_order(order_id).unwrap(), PayoutOutcome::AlreadyPaid);

    assert_eq!(m.balance(wallet.unwrap()), dec("180"));
    assert_eq!(m.ledger.history(wallet.unwrap()).unwrap().len(), 1);
}

#[test]
fn undelivered_orders_are_not_paid() {
    let mut m = Market::new("500");
    let designer = Seller::designer(SellerId::new());
    m.seller(designer, true);
    let design = DesignId::new();
    m.catalog.add_design(design);
    let request = CreateSessionRequest {
        shipping_address: "1 Oak Street".into(),
        hold_minutes: 0,
        items: vec![CartItem::design(designer, design, 2, dec("25"))],
    };
    let session = m.checkout().create_session(m.customer, &request).unwrap();
    let order_id = session.orders[0].order_id;
    let lifecycle = m.lifecycle();
    lifecycle.confirm_payment(order_id).unwrap();
    lifecycle.mark_shipped(order_id).unwrap();

    let engine = m.engine();
    assert_eq!(engine.sweep().unwrap().examined, 0);
    assert_eq!(engine.payout_order(order_id).unwrap(), PayoutOutcome::NotEligible);
    assert_eq!(m.balance(m.platform), dec("500"));
}

#[test]
fn multi_seller_session_pays_each_seller() {
    let mut m = Market::new("1000");
    let supplier = Seller::supplier(SellerId::new());
    let designer = Seller::designer(SellerId::new());
    let (_, supplier_wallet) = m.seller(supplier, true);
    let (_, designer_wallet) = m.seller(designer, true);
    let material = MaterialId::new();
    let design = DesignId::new();
    m.catalog.add_material(material);
    m.catalog.add_design(design);

    let request = CreateSessionRequest {
        shipping_address: "4 Cedar Way".into(),
        hold_minutes: 0,
        items: vec![
            CartItem::material(supplier, material, 2, dec("10")),
            CartItem::design(designer, design, 1, dec("50")),
        ],
    };
    let session = m.checkout().create_session(m.customer, &request).unwrap();
    assert_eq!(session.orders[0].total_amount, dec("20"));
    assert_eq!(session.orders[1].total_amount, dec("50"));

    let lifecycle = m.lifecycle();
    for order in &session.orders {
        lifecycle.confirm_payment(order.order_id).unwrap();
        lifecycle.mark_delivered(order.order_id).unwrap();
    }
    let group = lifecycle.get_group(session.order_group_id).unwrap();
    assert_eq!(group.status, OrderGroupStatus::Completed);

    let report = m.engine().sweep().unwrap();
    assert_eq!(report.paid.len(), 2);
    assert_eq!(report.fees_collected(), dec("7"));
    assert_eq!(m.balance(supplier_wallet.unwrap()), dec("18"));
    assert_eq!(m.balance(designer_wallet.unwrap()), dec("45"));
    assert_eq!(m.balance(m.platform), dec("937"));
}

#[test]
fn seller_without_wallet_is_skipped_and_sweep_continues() {
    let mut m = Market::new("1000");
    let paid_designer = Seller::designer(SellerId::new());
    let walletless = Seller::designer(SellerId::new());
    let (_, wallet) = m.seller(paid_designer, true);
    let (walletless_user, _) = m.seller(walletless, false);
    let stuck = m.delivered_order(walletless, "40");
    let paid = m.delivered_order(paid_designer, "60");

    let engine = m.engine();
    let report = engine.sweep().unwrap();
    assert_eq!(report.examined, 2);
    assert_eq!(report.paid.len(), 1);
    assert_eq!(report.paid[0].order_id, paid);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].order_id, stuck);
    assert!(!report.skipped[0].transient);
    assert!(!m.order(stuck).is_paid_out());
    assert_eq!(m.balance(wallet.unwrap()), dec("54"));

    // Once the seller gets a wallet the next sweep picks the order up.
    let late_wallet = m.ledger.open_wallet(walletless_user).unwrap();
    let report = engine.sweep().unwrap();
    assert_eq!(report.paid.len(), 1);
    assert_eq!(m.balance(late_wallet), dec("36"));
}

#[test]
fn unknown_seller_profile_is_skipped() {
    let mut m = Market::new("1000");
    let designer = Seller::designer(SellerId::new());
    m.seller(designer, true);
    let order_id = m.delivered_order(designer, "10");

    // An engine whose identity lookup no longer knows the seller.
    let engine = PayoutEngine::new(
        Arc::clone(&m.store),
        Arc::new(SellerDirectory::new()),
        SettlementConfig::new(m.platform),
    );
    let report = engine.sweep().unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].reason.contains("EM_ERR_203"));
    assert!(!m.order(order_id).is_paid_out());
}

#[test]
fn insufficient_escrow_leaves_order_unpaid() {
    let mut m = Market::new("50");
    let designer = Seller::designer(SellerId::new());
    let (_, wallet) = m.seller(designer, true);
    let order_id = m.delivered_order(designer, "100");

    let report = m.engine().sweep().unwrap();
    assert!(report.paid.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].reason.contains("EM_ERR_400"));
    assert!(!m.order(order_id).is_paid_out());
    assert_eq!(m.balance(m.platform), dec("50"));
    assert_eq!(m.balance(wallet.unwrap()), Decimal::ZERO);
}

#[test]
fn failed_commit_is_retried_by_next_sweep() {
    let mut m = Market::new("1000");
    let designer = Seller::designer(SellerId::new());
    let (_, wallet) = m.seller(designer, true);
    let order_id = m.delivered_order(designer, "100");
    let engine = m.engine();

    m.store.fail_next_commits(1);
    let report = engine.sweep().unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].transient);
    assert!(!m.order(order_id).is_paid_out());
    assert_eq!(m.balance(wallet.unwrap()), Decimal::ZERO);
    assert_eq!(m.balance(m.platform), dec("1000"));

    let report = engine.sweep().unwrap();
    assert_eq!(report.paid.len(), 1);
    assert_eq!(m.balance(wallet.unwrap()), dec("90"));
}

#[test]
fn legacy_paid_order_is_healed_and_paid() {
    let mut m = Market::new("1000");
    let designer = Seller::designer(SellerId::new());
    let (_, wallet) = m.seller(designer, true);
    let design = DesignId::new();
    m.catalog.add_design(design);
    let request = CreateSessionRequest {
        shipping_address: "2 Elm Close".into(),
        hold_minutes: 0,
        items: vec![CartItem::design(designer, design, 1, dec("30"))],
    };
    let session = m.checkout().create_session(m.customer, &request).unwrap();
    let order_id = session.orders[0].order_id;
    // Paid before fulfillment tracking existed: no fulfillment recorded.
    m.store
        .transaction("legacy_import", |t| {
            t.order_mut(order_id)?.payment_status = PaymentStatus::Paid;
            Ok(())
        })
        .unwrap();
    assert_eq!(m.order(order_id).fulfillment_status, FulfillmentStatus::None);

    let report = m.engine().sweep().unwrap();
    assert_eq!(report.paid.len(), 1);
    let order = m.order(order_id);
    assert!(order.is_paid_out());
    assert_eq!(order.fulfillment_status, FulfillmentStatus::Delivered);
    assert_eq!(order.status, OrderStatus::Delivered);
    assert_eq!(m.balance(wallet.unwrap()), dec("27"));
}

#[test]
fn zero_total_order_is_marked_paid_without_ledger_rows() {
    let mut m = Market::new("100");
    let designer = Seller::designer(SellerId::new());
    let (_, wallet) = m.seller(designer, true);
    let order_id = m.delivered_order(designer, "0");

    let report = m.engine().sweep().unwrap();
    assert_eq!(report.paid.len(), 1);
    assert_eq!(report.total_moved, Decimal::ZERO);
    assert!(m.order(order_id).is_paid_out());
    assert!(m.ledger.history(wallet.unwrap()).unwrap().is_empty());
    assert_eq!(m.ledger.history(m.platform).unwrap().len(), 1);
}

#[test]
fn concurrent_engines_never_pay_twice() {
    let mut m = Market::new("100000");
    let designer = Seller::designer(SellerId::new());
    let (_, wallet) = m.seller(designer, true);
    for _ in 0..25 {
        m.delivered_order(designer, "10");
    }
    let engines: Vec<PayoutEngine> = (0..4).map(|_| m.engine()).collect();

    let paid: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = engines
            .iter()
            .map(|engine| scope.spawn(move || engine.sweep().unwrap().paid.len()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(paid, 25);
    assert_eq!(m.balance(wallet.unwrap()), dec("225"));
    assert_eq!(m.ledger.history(wallet.unwrap()).unwrap().len(), 25);
    verify_supply(&m.store).unwrap();
}

#[test]
fn random_totals_conserve_money() {
    let mut m = Market::new("1000000");
    let mut rng = rand::thread_rng();
    let mut expected_seller = Decimal::ZERO;
    let designer = Seller::designer(SellerId::new());
    let (_, wallet) = m.seller(designer, true);

    for _ in 0..30 {
        let price = Decimal::new(rng.gen_range(0..500_000), 2);
        m.delivered_order(designer, &price.to_string());
        let fee = (price * dec("0.10"))
            .round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
        expected_seller += price - fee;
    }

    let report = m.engine().sweep().unwrap();
    assert_eq!(report.paid.len(), 30);
    for paid in &report.paid {
        assert_eq!(paid.split.fee + paid.split.seller_amount, paid.split.total);
    }
    assert_eq!(report.total_moved, expected_seller);
    assert_eq!(m.balance(wallet.unwrap()), expected_seller);
    assert_eq!(
        m.balance(m.platform) + m.balance(wallet.unwrap()),
        dec("1000000")
    );
    let snapshot = verify_supply(&m.store).unwrap();
    assert_eq!(snapshot.held, dec("1000000"));
}

#[test]
fn sweep_report_serializes() {
    let mut m = Market::new("100");
    let designer = Seller::designer(SellerId::new());
    m.seller(designer, true);
    m.delivered_order(designer, "10");
    let report = m.engine().sweep().unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["examined"], 1);
    let moved: Decimal = json["total_moved"].as_str().unwrap().parse().unwrap();
    assert_eq!(moved, dec("9"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scheduler_pays_in_background_and_stops() {
    let mut m = Market::new("1000");
    let designer = Seller::designer(SellerId::new());
    let (_, wallet) = m.seller(designer, true);
    let order_id = m.delivered_order(designer, "100");

    let engine = Arc::new(m.engine());
    let scheduler = PayoutScheduler::spawn(engine, Duration::from_millis(10));

    let mut waited = Duration::ZERO;
    while !m.order(order_id).is_paid_out() && waited < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += Duration::from_millis(10);
    }
    assert!(m.order(order_id).is_paid_out());
    assert!(scheduler.completed_sweeps() >= 1);
    scheduler.shutdown().await;

    assert_eq!(m.balance(wallet.unwrap()), dec("90"));
}

/// Directory that holds each lookup for a while, so a sweep stays in flight.
struct SlowDirectory {
    inner: SellerDirectory,
    entered: Arc<tokio::sync::Notify>,
    delay: Duration,
}

impl IdentityLookup for SlowDirectory {
    fn resolve_seller_user(&self, seller_type: SellerType, seller_id: SellerId) -> Option<UserId> {
        self.entered.notify_one();
        std::thread::sleep(self.delay);
        self.inner.resolve_seller_user(seller_type, seller_id)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_lets_the_running_sweep_finish() {
    let mut m = Market::new("1000");
    let designer = Seller::designer(SellerId::new());
    let (_, wallet) = m.seller(designer, true);
    let order_id = m.delivered_order(designer, "100");

    let entered = Arc::new(tokio::sync::Notify::new());
    let directory = SlowDirectory {
        inner: m.directory.clone(),
        entered: Arc::clone(&entered),
        delay: Duration::from_millis(300),
    };
    let engine = Arc::new(PayoutEngine::new(
        Arc::clone(&m.store),
        Arc::new(directory),
        SettlementConfig::new(m.platform),
    ));
    let scheduler = PayoutScheduler::spawn(engine, Duration::from_secs(3600));

    // The first tick fires at once; wait until its sweep is inside the lookup.
    tokio::time::timeout(Duration::from_secs(5), entered.notified())
        .await
        .unwrap();
    assert!(!m.order(order_id).is_paid_out());
    scheduler.shutdown().await;

    assert!(m.order(order_id).is_paid_out());
    assert_eq!(m.balance(wallet.unwrap()), dec("90"));
    assert_eq!(m.balance(m.platform), dec("910"));
    verify_supply(&m.store).unwrap();
}
