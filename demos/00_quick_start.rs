/// quick start - issue a loan and pay the first installment
use billing_engine_rs::{
    BillingEngine, CreateLoanRequest, Decimal, EngineConfig, MemoryStore, Money, SafeTimeProvider,
    TimeSource,
};
use chrono::{TimeZone, Utc};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
    ));
    let store = MemoryStore::new();
    let mut engine = BillingEngine::new(EngineConfig::standard())?;

    // 5,000,000 over 50 weeks at a flat 10%
    let mut tx = store.begin()?;
    let issuance = engine.create_loan(
        &mut tx,
        CreateLoanRequest::new(
            1,
            "Andi",
            "andi@example.com",
            Money::from_major(5_000_000),
            50,
            Decimal::from(10),
        ),
        &time,
    )?;
    tx.commit();
    println!("loan {} issued, total {}", issuance.loan_id, issuance.total_amount);
    println!("week {} due {}: {}", issuance.week, issuance.due_date, issuance.outstanding_amount);

    // pay the first installment
    let mut tx = store.begin()?;
    let receipt = engine.apply_payment(&mut tx, issuance.loan_id, issuance.outstanding_amount, &time)?;
    tx.commit();
    println!("receipt {}: settled weeks {:?}", receipt.reference, receipt.settled_weeks);

    let mut tx = store.begin()?;
    println!("{}", engine.loan_view(&mut tx, issuance.loan_id)?.to_json_pretty()?);

    Ok(())
}
