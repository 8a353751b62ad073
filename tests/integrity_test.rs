mod common;

use anyhow::Result;
use common::*;
use sqlx::SqlitePool;
use tally::io::{Exporter, LedgerSnapshot};

#[tokio::test]
async fn test_integrity_healthy_after_mixed_operations() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let asha = create_customer(&service, "Asha", "1").await?;
    let bala = create_customer(&service, "Bala", "2").await?;

    let txn = credit(&service, asha.id, 5000, "2024-01-01").await?;
    payment(&service, asha.id, 1000, "2024-01-02").await?;
    credit(&service, bala.id, 700, "2024-01-03").await?;
    service.delete_transaction(asha.id, txn.id).await?;
    service.delete_customer(bala.id).await?;

    let report = service.check_integrity().await?;
    assert!(report.is_healthy());
    assert_eq!(report.customer_count, 1);
    assert_eq!(report.transaction_count, 1);
    assert!(report.mismatches.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_integrity_detects_tampered_balance() -> Result<()> {
    let (service, temp) = test_service().await?;
    let asha = create_customer(&service, "Asha", "1").await?;
    let bala = create_customer(&service, "Bala", "2").await?;
    credit(&service, asha.id, 2500, "2024-01-01").await?;
    credit(&service, bala.id, 100, "2024-01-01").await?;

    let db_path = temp.path().join("test.db");
    let pool = SqlitePool::connect(&format!("sqlite:{}", db_path.display())).await?;
    sqlx::query("UPDATE customers SET outstanding_balance = 9999 WHERE id = ?")
        .bind(asha.id.to_string())
        .execute(&pool)
        .await?;
    pool.close().await;

    let report = service.check_integrity().await?;
    assert!(!report.is_healthy());
    assert_eq!(report.mismatches.len(), 1);

    let mismatch = &report.mismatches[0];
    assert_eq!(mismatch.customer_id, asha.id);
    assert_eq!(mismatch.cached, 9999);
    assert_eq!(mismatch.recomputed, 2500);
    Ok(())
}

#[tokio::test]
async fn test_export_customers_csv() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let asha = create_customer(&service, "Asha", "9000000001").await?;
    create_customer(&service, "Bala", "9000000002").await?;
    credit(&service, asha.id, 12345, "2024-01-01").await?;

    let mut buffer = Vec::new();
    let count = Exporter::new(&service)
        .export_customers_csv(&mut buffer)
        .await?;
    let output = String::from_utf8(buffer)?;
    let lines: Vec<_> = output.lines().collect();

    assert_eq!(count, 2);
    assert_eq!(lines[0], "id,name,mobile,place,outstanding_balance");
    assert_eq!(
        lines[1],
        format!("{},Asha,9000000001,,123.45", asha.id)
    );
    assert!(lines[2].contains(",Bala,9000000002,,0.00"));
    Ok(())
}

#[tokio::test]
async fn test_export_history_csv_newest_first() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let asha = create_customer(&service, "Asha", "1").await?;
    credit(&service, asha.id, 5000, "2024-01-01").await?;
    payment(&service, asha.id, 1250, "2024-02-01").await?;

    let mut buffer = Vec::new();
    let count = Exporter::new(&service)
        .export_history_csv(asha.id, &mut buffer)
        .await?;
    let output = String::from_utf8(buffer)?;
    let lines: Vec<_> = output.lines().collect();

    assert_eq!(count, 2);
    assert_eq!(lines[0], "id,date,type,amount,description");
    assert!(lines[1].contains(",2024-02-01,payment,12.50,"));
    assert!(lines[2].contains(",2024-01-01,credit,50.00,"));
    Ok(())
}

#[tokio::test]
async fn test_export_full_json_snapshot() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let asha = create_customer(&service, "Asha", "1").await?;
    let bala = create_customer(&service, "Bala", "2").await?;
    credit(&service, asha.id, 300, "2024-01-01").await?;
    payment(&service, bala.id, 200, "2024-01-02").await?;

    let mut buffer = Vec::new();
    let snapshot = Exporter::new(&service)
        .export_full_json(&mut buffer)
        .await?;
    let parsed: LedgerSnapshot = serde_json::from_slice(&buffer)?;

    assert_eq!(snapshot.customers.len(), 2);
    assert_eq!(parsed.customers, snapshot.customers);
    assert_eq!(parsed.transactions, snapshot.transactions);
    assert_eq!(parsed.transactions[0].customer_id, asha.id);
    assert!(parsed.transactions[0].sequence < parsed.transactions[1].sequence);
    Ok(())
}
