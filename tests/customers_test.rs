mod common;

use anyhow::Result;
use common::*;
use tally::application::{AppError, ErrorKind};
use tally::domain::CustomerProfile;
use uuid::Uuid;

#[tokio::test]
async fn test_create_customer_starts_at_zero() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let customer = service
        .create_customer(CustomerProfile::new(" Asha ", "9000000001").with_place("Market Road"))
        .await?;

    assert_eq!(customer.name, "Asha");
    assert_eq!(customer.outstanding_balance, 0);

    let detail = service.get_customer(customer.id).await?;
    assert_eq!(detail.customer, customer);
    assert!(detail.transactions.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_create_customer_requires_name_and_mobile() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let no_name = service
        .create_customer(CustomerProfile::new("  ", "9000000001"))
        .await;
    let no_mobile = service.create_customer(CustomerProfile::new("Asha", "")).await;

    assert!(matches!(no_name, Err(AppError::InvalidInput(_))));
    assert!(matches!(no_mobile, Err(AppError::InvalidInput(_))));
    assert!(service.list_customers(None).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_duplicate_mobile_conflict() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let first = create_customer(&service, "Asha", "999").await?;
    credit(&service, first.id, 1200, "2024-01-01").await?;

    let second = create_customer(&service, "Bala", "999").await;
    let err = second.unwrap_err().downcast::<AppError>()?;

    assert!(matches!(err, AppError::DuplicateMobile(ref m) if m == "999"));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let customers = service.list_customers(None).await?;
    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0].name, "Asha");
    assert_eq!(customers[0].outstanding_balance, 1200);
    Ok(())
}

#[tokio::test]
async fn test_update_profile_leaves_balance_alone() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = create_customer(&service, "Asha", "9000000001").await?;
    credit(&service, customer.id, 4200, "2024-01-01").await?;

    let updated = service
        .update_customer_profile(
            customer.id,
            CustomerProfile::new("Asha K", "9000000009").with_place("Hill Street"),
        )
        .await?;

    assert_eq!(updated.id, customer.id);
    assert_eq!(updated.name, "Asha K");
    assert_eq!(updated.mobile, "9000000009");
    assert_eq!(updated.place.as_deref(), Some("Hill Street"));
    assert_eq!(updated.outstanding_balance, 4200);
    assert_eq!(service.get_customer(customer.id).await?.transactions.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_update_profile_returns_stored_row() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = create_customer(&service, "Asha", "9000000001").await?;
    credit(&service, customer.id, 800, "2024-01-01").await?;

    let updated = service
        .update_customer_profile(customer.id, CustomerProfile::new(" Asha R ", "9000000001"))
        .await?;

    let stored = service.get_customer(customer.id).await?.customer;
    assert_eq!(updated, stored);
    assert_eq!(updated.name, "Asha R");
    assert_eq!(updated.created_at, customer.created_at);
    Ok(())
}

#[tokio::test]
async fn test_update_profile_keeping_own_mobile() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = create_customer(&service, "Asha", "9000000001").await?;

    let updated = service
        .update_customer_profile(customer.id, CustomerProfile::new("Asha R", "9000000001"))
        .await?;

    assert_eq!(updated.name, "Asha R");
    Ok(())
}

#[tokio::test]
async fn test_update_profile_duplicate_mobile() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let asha = create_customer(&service, "Asha", "111").await?;
    let bala = create_customer(&service, "Bala", "222").await?;

    let result = service
        .update_customer_profile(bala.id, CustomerProfile::new("Bala", "111"))
        .await;

    assert!(matches!(result, Err(AppError::DuplicateMobile(_))));
    assert_eq!(service.get_customer(bala.id).await?.customer.mobile, "222");
    assert_eq!(service.get_customer(asha.id).await?.customer.mobile, "111");
    Ok(())
}

#[tokio::test]
async fn test_update_profile_unknown_customer() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let result = service
        .update_customer_profile(Uuid::new_v4(), CustomerProfile::new("Ghost", "000"))
        .await;

    assert!(matches!(result, Err(AppError::CustomerNotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_cascade_delete() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = create_customer(&service, "Asha", "9000000001").await?;
    let other = create_customer(&service, "Bala", "9000000002").await?;

    credit(&service, customer.id, 5000, "2024-01-01").await?;
    payment(&service, customer.id, 2000, "2024-01-02").await?;
    credit(&service, customer.id, 1000, "2024-01-03").await?;
    credit(&service, other.id, 300, "2024-01-03").await?;
    assert_eq!(balance_of(&service, customer.id).await?, 4000);

    let deleted = service.delete_customer(customer.id).await?;
    assert_eq!(deleted.customer.id, customer.id);
    assert_eq!(deleted.removed_transactions, 3);

    assert!(matches!(
        service.get_customer(customer.id).await,
        Err(AppError::CustomerNotFound(_))
    ));
    let remaining = service.list_all_transactions().await?;
    assert_eq!(remaining.len(), 1);
    assert!(remaining.iter().all(|t| t.customer_id != customer.id));
    assert_eq!(balance_of(&service, other.id).await?, 300);
    Ok(())
}

#[tokio::test]
async fn test_delete_absent_customer_reports_not_found() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = create_customer(&service, "Asha", "9000000001").await?;

    service.delete_customer(customer.id).await?;
    let again = service.delete_customer(customer.id).await;

    assert!(matches!(again, Err(AppError::CustomerNotFound(id)) if id == customer.id));
    Ok(())
}

#[tokio::test]
async fn test_mobile_is_reusable_after_delete() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = create_customer(&service, "Asha", "999").await?;
    service.delete_customer(customer.id).await?;

    let replacement = create_customer(&service, "Bala", "999").await?;
    assert_eq!(replacement.mobile, "999");
    Ok(())
}

#[tokio::test]
async fn test_list_customers_sorted_by_name() -> Result<()> {
    let (service, _temp) = test_service().await?;
    create_customer(&service, "Meena", "3").await?;
    let asha = create_customer(&service, "Asha", "1").await?;
    create_customer(&service, "Ravi", "2").await?;
    credit(&service, asha.id, 900, "2024-01-01").await?;

    let customers = service.list_customers(None).await?;
    let names: Vec<_> = customers.iter().map(|c| c.name.as_str()).collect();

    assert_eq!(names, vec!["Asha", "Meena", "Ravi"]);
    assert_eq!(customers[0].outstanding_balance, 900);
    Ok(())
}

#[tokio::test]
async fn test_list_customers_search() -> Result<()> {
    let (service, _temp) = test_service().await?;
    create_customer(&service, "Ravi Kumar", "1").await?;
    create_customer(&service, "Kumari Devi", "2").await?;
    create_customer(&service, "Asha", "3").await?;

    let found = service.list_customers(Some("KUMAR")).await?;
    let names: Vec<_> = found.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Kumari Devi", "Ravi Kumar"]);

    assert_eq!(service.list_customers(Some("  ")).await?.len(), 3);
    assert!(service.list_customers(Some("zzz")).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_summary_totals_balances() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let asha = create_customer(&service, "Asha", "1").await?;
    let bala = create_customer(&service, "Bala", "2").await?;
    create_customer(&service, "Chitra", "3").await?;

    credit(&service, asha.id, 10050, "2024-01-01").await?;
    credit(&service, bala.id, 2000, "2024-01-01").await?;
    payment(&service, bala.id, 2500, "2024-01-02").await?;

    let summary = service.summary().await?;
    assert_eq!(summary.customer_count, 3);
    assert_eq!(summary.total_outstanding, 9550);
    Ok(())
}
