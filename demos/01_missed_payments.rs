/// missed payments - daily reconciliation, delinquency and catching up
use billing_engine_rs::{
    BillingEngine, CreateLoanRequest, Decimal, EngineConfig, Event, MemoryStore, Money,
    SafeTimeProvider, TimeSource,
};
use chrono::{Duration, TimeZone, Utc};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("=== missed payments example ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();
    let store = MemoryStore::new();
    let mut engine = BillingEngine::new(EngineConfig::standard())?;

    let mut tx = store.begin()?;
    let issuance = engine.create_loan(
        &mut tx,
        CreateLoanRequest::new(
            7,
            "Sari",
            "sari@example.com",
            Money::from_major(5_000_000),
            50,
            Decimal::from(10),
        ),
        &time,
    )?;
    tx.commit();
    let loan_id = issuance.loan_id;
    println!("loan {} issued on {}", loan_id, time.now().format("%Y-%m-%d"));

    // the customer pays nothing for two weeks; the job runs every day
    for _day in 0..15 {
        controller.advance(Duration::days(1));
        let mut tx = store.begin()?;
        engine.run_daily(&mut tx, &time)?;
        tx.commit();
    }
    println!("\nadvanced to: {}", time.now().format("%Y-%m-%d"));

    let mut tx = store.begin()?;
    let due = engine.get_outstanding(&mut tx, loan_id)?;
    let delinquent = engine.is_delinquent(&mut tx, issuance.customer_id)?;
    drop(tx);

    let Some(due) = due else {
        println!("nothing due");
        return Ok(());
    };
    println!("outstanding: {} (reported against week {})", due.outstanding_amount, due.weeks_outstanding);
    println!("delinquent: {}", delinquent);

    // a partial payment is rejected
    let mut tx = store.begin()?;
    if let Err(err) = engine.apply_payment(&mut tx, loan_id, Money::from_major(110_000), &time) {
        println!("\nrejected: {}", err);
    }
    drop(tx);

    // catching up settles every overdue week plus the current one
    let mut tx = store.begin()?;
    let receipt = engine.apply_payment(&mut tx, loan_id, due.outstanding_amount, &time)?;
    tx.commit();
    println!("\nsettled weeks {:?}, next due week {:?}", receipt.settled_weeks, receipt.next_outstanding_week);

    let mut tx = store.begin()?;
    println!("delinquent: {}", engine.is_delinquent(&mut tx, issuance.customer_id)?);

    let missed = engine
        .events()
        .iter()
        .filter(|e| matches!(e, Event::PaymentMissed { .. }))
        .count();
    println!("missed-payment events: {}", missed);

    Ok(())
}
