use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_lots_table::Migration),
            Box::new(m20240601_000002_create_lot_pricing_table::Migration),
            Box::new(m20240601_000003_create_service_offerings_table::Migration),
            Box::new(m20240601_000004_create_bookings_table::Migration),
            Box::new(m20240601_000005_create_booking_addons_table::Migration),
            Box::new(m20240601_000006_create_payments_table::Migration),
            Box::new(m20240601_000007_create_spot_holds_table::Migration),
            Box::new(m20240601_000008_create_users_table::Migration),
        ]
    }
}

mod m20240601_000001_create_lots_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_lots_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Lots::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Lots::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Lots::Code).string().not_null().unique_key())
                        .col(ColumnDef::new(Lots::Name).string().not_null())
                        .col(ColumnDef::new(Lots::Names).json().null())
                        .col(ColumnDef::new(Lots::Address).string().null())
                        .col(ColumnDef::new(Lots::TotalSpaces).integer().not_null())
                        .col(
                            ColumnDef::new(Lots::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        // bumped under a transaction to serialize spot holds per lot
                        .col(
                            ColumnDef::new(Lots::HoldVersion)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Lots::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Lots::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Lots::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Lots {
        Table,
        Id,
        Code,
        Name,
        Names,
        Address,
        TotalSpaces,
        IsActive,
        HoldVersion,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000002_create_lot_pricing_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_lot_pricing_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(LotPricing::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(LotPricing::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(LotPricing::LotId).uuid().not_null())
                        .col(ColumnDef::new(LotPricing::VehicleType).string().not_null())
                        .col(
                            ColumnDef::new(LotPricing::PricePerDay)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LotPricing::WeeklyDiscountPercent)
                                .decimal()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(LotPricing::MonthlyDiscountPercent)
                                .decimal()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(LotPricing::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(LotPricing::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LotPricing::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_lot_pricing_lot_id")
                                .from(LotPricing::Table, LotPricing::LotId)
                                .to(Lots::Table, Lots::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_lot_pricing_lot_vehicle_active")
                        .table(LotPricing::Table)
                        .col(LotPricing::LotId)
                        .col(LotPricing::VehicleType)
                        .col(LotPricing::IsActive)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(LotPricing::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum LotPricing {
        Table,
        Id,
        LotId,
        VehicleType,
        PricePerDay,
        WeeklyDiscountPercent,
        MonthlyDiscountPercent,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Lots {
        Table,
        Id,
    }
}

mod m20240601_000003_create_service_offerings_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_service_offerings_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ServiceOfferings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ServiceOfferings::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ServiceOfferings::Name).string().not_null())
                        .col(ColumnDef::new(ServiceOfferings::Description).text().null())
                        .col(
                            ColumnDef::new(ServiceOfferings::Price)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ServiceOfferings::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(ServiceOfferings::SortOrder)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ServiceOfferings::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ServiceOfferings::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ServiceOfferings::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ServiceOfferings {
        Table,
        Id,
        Name,
        Description,
        Price,
        IsActive,
        SortOrder,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000004_create_bookings_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000004_create_bookings_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Bookings::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Bookings::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Bookings::Reference)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Bookings::LotId).uuid().not_null())
                        .col(ColumnDef::new(Bookings::VehicleType).string().not_null())
                        .col(ColumnDef::new(Bookings::LicensePlate).string().not_null())
                        .col(ColumnDef::new(Bookings::VehicleMake).string().null())
                        .col(ColumnDef::new(Bookings::VehicleModel).string().null())
                        .col(ColumnDef::new(Bookings::CustomerName).string().not_null())
                        .col(ColumnDef::new(Bookings::CustomerEmail).string().not_null())
                        .col(ColumnDef::new(Bookings::CustomerPhone).string().null())
                        .col(
                            ColumnDef::new(Bookings::DropOffTime)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Bookings::PickUpTime)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Bookings::ActualDropOffTime)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Bookings::ActualPickUpTime)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Bookings::DepartureFlight).string().null())
                        .col(ColumnDef::new(Bookings::ArrivalFlight).string().null())
                        .col(ColumnDef::new(Bookings::Status).string().not_null())
                        .col(ColumnDef::new(Bookings::TotalDays).integer().not_null())
                        .col(ColumnDef::new(Bookings::DailyRate).big_integer().not_null())
                        .col(
                            ColumnDef::new(Bookings::DiscountAmount)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Bookings::AddonsTotal)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Bookings::TotalPrice).big_integer().not_null())
                        .col(ColumnDef::new(Bookings::Currency).string().not_null())
                        .col(ColumnDef::new(Bookings::SpotNumber).string().null())
                        .col(ColumnDef::new(Bookings::Notes).text().null())
                        .col(
                            ColumnDef::new(Bookings::ReminderSentAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Bookings::CancelledAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Bookings::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Bookings::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_bookings_lot_id")
                                .from(Bookings::Table, Bookings::LotId)
                                .to(Lots::Table, Lots::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_bookings_lot_status")
                        .table(Bookings::Table)
                        .col(Bookings::LotId)
                        .col(Bookings::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_bookings_drop_off_time")
                        .table(Bookings::Table)
                        .col(Bookings::DropOffTime)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_bookings_customer_email")
                        .table(Bookings::Table)
                        .col(Bookings::CustomerEmail)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Bookings::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Bookings {
        Table,
        Id,
        Reference,
        LotId,
        VehicleType,
        LicensePlate,
        VehicleMake,
        VehicleModel,
        CustomerName,
        CustomerEmail,
        CustomerPhone,
        DropOffTime,
        PickUpTime,
        ActualDropOffTime,
        ActualPickUpTime,
        DepartureFlight,
        ArrivalFlight,
        Status,
        TotalDays,
        DailyRate,
        DiscountAmount,
        AddonsTotal,
        TotalPrice,
        Currency,
        SpotNumber,
        Notes,
        ReminderSentAt,
        CancelledAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Lots {
        Table,
        Id,
    }
}

mod m20240601_000005_create_booking_addons_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000005_create_booking_addons_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(BookingAddons::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BookingAddons::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(BookingAddons::BookingId).uuid().not_null())
                        .col(
                            ColumnDef::new(BookingAddons::ServiceOfferingId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(BookingAddons::Name).string().not_null())
                        .col(
                            ColumnDef::new(BookingAddons::Price)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(BookingAddons::Status).string().not_null())
                        .col(
                            ColumnDef::new(BookingAddons::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(BookingAddons::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BookingAddons::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_booking_addons_booking_id")
                                .from(BookingAddons::Table, BookingAddons::BookingId)
                                .to(Bookings::Table, Bookings::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_booking_addons_booking_id")
                        .table(BookingAddons::Table)
                        .col(BookingAddons::BookingId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BookingAddons::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum BookingAddons {
        Table,
        Id,
        BookingId,
        ServiceOfferingId,
        Name,
        Price,
        Status,
        CompletedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Bookings {
        Table,
        Id,
    }
}

mod m20240601_000006_create_payments_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000006_create_payments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Payments::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Payments::BookingId).uuid().not_null())
                        .col(ColumnDef::new(Payments::Amount).big_integer().not_null())
                        .col(ColumnDef::new(Payments::Currency).string().not_null())
                        .col(ColumnDef::new(Payments::Status).string().not_null())
                        .col(ColumnDef::new(Payments::ProviderReference).string().null())
                        .col(ColumnDef::new(Payments::RedirectUrl).string().null())
                        .col(
                            ColumnDef::new(Payments::RefundedAmount)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Payments::RefundReason).string().null())
                        .col(ColumnDef::new(Payments::FailureReason).string().null())
                        .col(
                            ColumnDef::new(Payments::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Payments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Payments::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_payments_booking_id")
                                .from(Payments::Table, Payments::BookingId)
                                .to(Bookings::Table, Bookings::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payments_booking_id")
                        .table(Payments::Table)
                        .col(Payments::BookingId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payments_provider_reference")
                        .table(Payments::Table)
                        .col(Payments::ProviderReference)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Payments {
        Table,
        Id,
        BookingId,
        Amount,
        Currency,
        Status,
        ProviderReference,
        RedirectUrl,
        RefundedAmount,
        RefundReason,
        FailureReason,
        CompletedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Bookings {
        Table,
        Id,
    }
}

mod m20240601_000007_create_spot_holds_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000007_create_spot_holds_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // One row per checkout session; the session id is the key
            manager
                .create_table(
                    Table::create()
                        .table(SpotHolds::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SpotHolds::SessionId)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SpotHolds::LotId).uuid().not_null())
                        .col(
                            ColumnDef::new(SpotHolds::StartTime)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SpotHolds::EndTime)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SpotHolds::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SpotHolds::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_spot_holds_lot_id")
                                .from(SpotHolds::Table, SpotHolds::LotId)
                                .to(Lots::Table, Lots::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_spot_holds_lot_expires")
                        .table(SpotHolds::Table)
                        .col(SpotHolds::LotId)
                        .col(SpotHolds::ExpiresAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SpotHolds::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum SpotHolds {
        Table,
        SessionId,
        LotId,
        StartTime,
        EndTime,
        ExpiresAt,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Lots {
        Table,
        Id,
    }
}

mod m20240601_000008_create_users_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000008_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(ColumnDef::new(Users::Role).string().not_null())
                        .col(
                            ColumnDef::new(Users::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Users::LastLoginAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
        Email,
        Name,
        PasswordHash,
        Role,
        IsActive,
        LastLoginAt,
        CreatedAt,
        UpdatedAt,
    }
}
