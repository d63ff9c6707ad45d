pub use sea_orm_migration::prelude::*;

mod m20240101_000001_orgs;
mod m20240102_000002_contacts_properties;
mod m20240103_000003_deals;
mod m20240104_000004_milestones;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_orgs::Migration),
            Box::new(m20240102_000002_contacts_properties::Migration),
            Box::new(m20240103_000003_deals::Migration),
            Box::new(m20240104_000004_milestones::Migration),
        ]
    }
}
