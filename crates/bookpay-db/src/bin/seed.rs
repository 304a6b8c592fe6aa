//! # Seed Data Generator
//!
//! Populates the database with a demo tenant and two bookable services.
//!
//! ## Usage
//! ```bash
//! cargo run -p bookpay-db --bin seed
//!
//! # Specify database path
//! cargo run -p bookpay-db --bin seed -- --db ./data/bookpay.db
//! ```
//!
//! ## Generated Data
//! - Tenant `demo-salon` on the shared tier
//! - "Haircut" (30 min) with inline Monday-Friday slots 09:00-16:30
//! - "Deep Tissue Massage" (60 min) with relational rows, Mon-Sat 10:00-18:00
//! - One unpaid order and one unpaid invoice

use chrono::{NaiveTime, Weekday};
use std::collections::BTreeMap;
use std::env;

use bookpay_core::availability::{DaySchedule, WeeklySchedule};
use bookpay_core::{Money, Tenant, TenantScope, TenantTier};
use bookpay_db::{Database, DbConfig, NewAvailabilitySlot, NewService};

const TENANT_ID: &str = "demo-salon";

const WEEKDAYS: [&str; 5] = ["monday", "tuesday", "wednesday", "thursday", "friday"];

/// Every half hour from 09:00 to 16:30.
fn half_hour_slots() -> Vec<String> {
    (9..17)
        .flat_map(|h| [format!("{h:02}:00"), format!("{h:02}:30")])
        .collect()
}

fn time(h: u32) -> Result<NaiveTime, String> {
    NaiveTime::from_hms_opt(h, 0, 0).ok_or_else(|| format!("invalid hour {h}"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = "bookpay.db".to_string();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: seed [--db <path>]");
                println!();
                println!("Options:");
                println!("  --db, -d      Database path (default: bookpay.db)");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Seeding {db_path}");

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let scope = TenantScope::Tenant(TENANT_ID.to_string());

    if db.tenants().get(TENANT_ID).await?.is_some() {
        println!("Tenant {TENANT_ID} already exists, nothing to do");
        return Ok(());
    }

    db.tenants()
        .insert(&Tenant {
            id: TENANT_ID.to_string(),
            name: "Demo Salon".to_string(),
            tier: TenantTier::Shared,
            subaccount_code: None,
            is_active: true,
            contact_email: Some("owner@demo-salon.test".to_string()),
        })
        .await?;

    let mut days = BTreeMap::new();
    for day in WEEKDAYS {
        days.insert(
            day.to_string(),
            DaySchedule {
                available: true,
                time_slots: half_hour_slots(),
            },
        );
    }

    let haircut = db
        .services()
        .insert(&NewService {
            tenant_id: Some(TENANT_ID.to_string()),
            store_id: None,
            title: "Haircut".to_string(),
            description: Some("Wash, cut and style".to_string()),
            price: Money::from_major(5_000),
            duration_minutes: 30,
            availability: Some(WeeklySchedule(days)),
        })
        .await?;

    let massage = db
        .services()
        .insert(&NewService {
            tenant_id: Some(TENANT_ID.to_string()),
            store_id: None,
            title: "Deep Tissue Massage".to_string(),
            description: None,
            price: Money::from_major(15_000),
            duration_minutes: 60,
            availability: None,
        })
        .await?;

    for weekday in [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
    ] {
        db.services()
            .insert_slot(&NewAvailabilitySlot {
                tenant_id: Some(TENANT_ID.to_string()),
                service_id: massage,
                store_id: None,
                weekday,
                start_time: time(10)?,
                end_time: time(18)?,
                is_available: true,
            })
            .await?;
    }

    let order = db
        .orders()
        .insert_order(
            &scope,
            "ORD-0001",
            Some("customer@example.com"),
            Some("Demo Customer"),
            Money::from_major(12_500),
        )
        .await?;
    let invoice = db
        .orders()
        .insert_invoice(&scope, "INV-0001", Money::from_major(30_000))
        .await?;

    println!("Created tenant {TENANT_ID}");
    println!("  service {haircut}: Haircut (inline slots)");
    println!("  service {massage}: Deep Tissue Massage (relational slots)");
    println!("  order {order}, invoice {invoice}");

    db.close().await;
    Ok(())
}
