use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use entity::{contacts, properties};
use platform_db::DbPool;
use products_pipeline::{
    BuyerStage, DealFilter, NewDeal, PipelineService, SellerStage, Stage, TenantId,
};
use sea_orm::{ActiveModelTrait, Set};
use tracing::info;
use uuid::Uuid;

use crate::pipeline_service;

/// Creates the org when missing and fills an empty one with demo deals.
pub async fn run(pool: &DbPool, slug: &str) -> Result<()> {
    let org = platform_db::ensure_org(pool, slug, "Demo Realty").await?;
    let tenant = TenantId(org);
    let service = pipeline_service(pool);
    let existing = service.list_deals(tenant, &DealFilter::default()).await?;
    if !existing.is_empty() {
        info!(%org, deals = existing.len(), "org already seeded");
        return Ok(());
    }

    let buyer = insert_contact(pool, tenant, "Maya", "maya@example.test").await?;
    let seller = insert_contact(pool, tenant, "Jon", "jon@example.test").await?;
    let property = insert_property(pool, tenant, "118 Live Oak St", 48_500_000).await?;
    let today = Utc::now().date_naive();

    let mut buying = NewDeal::new("Maya: Live Oak purchase", Stage::Buyer(BuyerStage::Negotiating));
    buying.parties.buyer_contact_id = Some(buyer);
    buying.parties.seller_contact_id = Some(seller);
    buying.property_id = Some(property);
    buying.financials.estimated_value_cents = Some(48_500_000);
    buying.financials.commission_rate_bps = Some(300);
    buying.dates.option_period_end = today.checked_add_signed(Duration::days(10));
    buying.dates.inspection_date = today.checked_add_signed(Duration::days(8));
    buying.dates.expected_close_date = today.checked_add_signed(Duration::days(45));
    let buying = service.create_deal(tenant, buying, None).await?;

    let mut listing = NewDeal::new("Jon: Live Oak listing", Stage::Seller(SellerStage::Listed));
    listing.parties.seller_contact_id = Some(seller);
    listing.property_id = Some(property);
    listing.financials.estimated_value_cents = Some(48_500_000);
    service.create_deal(tenant, listing, None).await?;

    let mut browsing = NewDeal::new("Maya: backup search", Stage::Buyer(BuyerStage::Browsing));
    browsing.parties.buyer_contact_id = Some(buyer);
    service.create_deal(tenant, browsing, None).await?;

    let moved = service
        .move_stage(
            tenant,
            buying.id,
            "under_contract",
            None,
            Some("executed contract received".into()),
        )
        .await
        .context("moving the demo deal under contract")?;
    info!(
        %org,
        milestones = moved.milestones().len(),
        "seeded demo pipeline"
    );
    Ok(())
}

async fn insert_contact(
    pool: &DbPool,
    tenant: TenantId,
    first_name: &str,
    email: &str,
) -> Result<Uuid> {
    let now = Utc::now();
    let model = contacts::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(tenant.0),
        first_name: Set(first_name.to_string()),
        last_name: Set(None),
        email: Set(Some(email.to_string())),
        phone: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(pool)
    .await?;
    Ok(model.id)
}

async fn insert_property(
    pool: &DbPool,
    tenant: TenantId,
    address: &str,
    list_price_cents: i64,
) -> Result<Uuid> {
    let now = Utc::now();
    let model = properties::ActiveModel {
        id: Set(Uuid::new_v4()),
        org_id: Set(tenant.0),
        address_line: Set(address.to_string()),
        city: Set(Some("Austin".into())),
        region: Set(Some("TX".into())),
        postal_code: Set(None),
        list_price_cents: Set(Some(list_price_cents)),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(pool)
    .await?;
    Ok(model.id)
}
