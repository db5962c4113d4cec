// src/db.rs - Database migrations and seed data

use anyhow::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Enable foreign keys and WAL mode
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;

    // Create admins table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS admins (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE CHECK(length(username) >= 3 AND length(username) <= 50),
            email TEXT NOT NULL UNIQUE CHECK(length(email) >= 5 AND length(email) <= 255),
            password_hash TEXT NOT NULL,
            full_name TEXT CHECK(full_name IS NULL OR length(full_name) <= 255),
            is_active INTEGER NOT NULL DEFAULT 1 CHECK(is_active IN (0, 1)),
            last_login DATETIME,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create clinics table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clinics (
            id TEXT PRIMARY KEY,
            clinic_name TEXT NOT NULL CHECK(length(clinic_name) > 0 AND length(clinic_name) <= 255),
            email TEXT NOT NULL UNIQUE CHECK(length(email) >= 5 AND length(email) <= 255),
            phone TEXT NOT NULL CHECK(length(phone) >= 5 AND length(phone) <= 30),
            region TEXT NOT NULL CHECK(length(region) > 0 AND length(region) <= 255),
            city TEXT NOT NULL CHECK(length(city) > 0 AND length(city) <= 255),
            password_hash TEXT NOT NULL,
            contact_person_name TEXT NOT NULL CHECK(length(contact_person_name) > 0 AND length(contact_person_name) <= 255),
            contact_person_position TEXT CHECK(contact_person_position IS NULL OR length(contact_person_position) <= 255),
            inn TEXT CHECK(inn IS NULL OR length(inn) <= 12),
            legal_address TEXT CHECK(legal_address IS NULL OR length(legal_address) <= 500),
            terms_accepted INTEGER NOT NULL DEFAULT 0 CHECK(terms_accepted IN (0, 1)),
            data_processing_accepted INTEGER NOT NULL DEFAULT 0 CHECK(data_processing_accepted IN (0, 1)),
            consent_date DATETIME,
            account_status TEXT NOT NULL DEFAULT 'on_moderation' CHECK(
                account_status IN ('on_moderation', 'active', 'blocked')
            ),
            failed_login_attempts INTEGER NOT NULL DEFAULT 0,
            locked_until DATETIME,
            last_login DATETIME,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create doctors table; list fields hold JSON arrays as TEXT
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS doctors (
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL CHECK(length(full_name) > 0 AND length(full_name) <= 255),
            specialty TEXT NOT NULL CHECK(length(specialty) > 0 AND length(specialty) <= 100),
            workplace TEXT NOT NULL CHECK(length(workplace) > 0 AND length(workplace) <= 255),
            workplace_type TEXT NOT NULL CHECK(workplace_type IN ('federal', 'private')),
            experience_years INTEGER NOT NULL CHECK(experience_years >= 0 AND experience_years <= 70),
            prepayment INTEGER NOT NULL CHECK(prepayment >= 0),
            photo_url TEXT CHECK(photo_url IS NULL OR length(photo_url) <= 500),
            description TEXT CHECK(description IS NULL OR length(description) <= 2000),
            education TEXT,
            skills TEXT,
            achievements TEXT,
            services_provided TEXT,
            available_dates TEXT,
            status TEXT NOT NULL DEFAULT 'active' CHECK(status IN ('active', 'inactive')),
            rating REAL CHECK(rating IS NULL OR (rating >= 0 AND rating <= 5)),
            successful_visits_count INTEGER NOT NULL DEFAULT 0 CHECK(successful_visits_count >= 0),
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create orders table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            clinic_id TEXT NOT NULL,
            doctor_id TEXT,
            visit_date DATE,
            visit_time TEXT CHECK(visit_time IS NULL OR length(visit_time) <= 20),
            patient_count INTEGER NOT NULL CHECK(patient_count >= 1 AND patient_count <= 500),
            urgency_level TEXT NOT NULL DEFAULT 'normal' CHECK(
                urgency_level IN ('normal', 'urgent', 'emergency')
            ),
            status TEXT NOT NULL DEFAULT 'new' CHECK(
                status IN ('new', 'confirmed', 'in_progress', 'completed', 'cancelled', 'rejected')
            ),
            contact_person TEXT NOT NULL CHECK(length(contact_person) > 0 AND length(contact_person) <= 255),
            contact_phone TEXT NOT NULL CHECK(length(contact_phone) >= 5 AND length(contact_phone) <= 30),
            visit_city TEXT CHECK(visit_city IS NULL OR length(visit_city) <= 255),
            visit_region TEXT CHECK(visit_region IS NULL OR length(visit_region) <= 255),
            clinic_comments TEXT CHECK(clinic_comments IS NULL OR length(clinic_comments) <= 2000),
            admin_notes TEXT CHECK(admin_notes IS NULL OR length(admin_notes) <= 2000),
            estimated_cost REAL CHECK(estimated_cost IS NULL OR estimated_cost >= 0),
            actual_cost REAL CHECK(actual_cost IS NULL OR actual_cost >= 0),
            payment_status TEXT CHECK(payment_status IS NULL OR length(payment_status) <= 50),
            assigned_by_admin_id TEXT,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            confirmed_at DATETIME,
            completed_at DATETIME,
            cancelled_at DATETIME,
            FOREIGN KEY (clinic_id) REFERENCES clinics (id) ON DELETE CASCADE,
            FOREIGN KEY (doctor_id) REFERENCES doctors (id),
            FOREIGN KEY (assigned_by_admin_id) REFERENCES admins (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // ==================== CREATE INDEXES ====================

    let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_clinics_email ON clinics(email)")
        .execute(pool)
        .await;
    let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_clinics_status ON clinics(account_status)")
        .execute(pool)
        .await;
    let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_doctors_specialty ON doctors(specialty)")
        .execute(pool)
        .await;
    let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_doctors_status ON doctors(status)")
        .execute(pool)
        .await;
    let _ = sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_doctors_workplace_type ON doctors(workplace_type)",
    )
    .execute(pool)
    .await;
    let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_clinic ON orders(clinic_id)")
        .execute(pool)
        .await;
    let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_doctor ON orders(doctor_id)")
        .execute(pool)
        .await;
    let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status)")
        .execute(pool)
        .await;
    let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_visit_date ON orders(visit_date)")
        .execute(pool)
        .await;

    Ok(())
}

// ==================== SEED DATA ====================

struct SeedDoctor {
    full_name: &'static str,
    specialty: &'static str,
    workplace: &'static str,
    workplace_type: &'static str,
    experience_years: i64,
    prepayment: i64,
    description: &'static str,
    skills: &'static [&'static str],
}

const SEED_DOCTORS: &[SeedDoctor] = &[
    SeedDoctor {
        full_name: "Иванов Сергей Петрович",
        specialty: "Нейрохирург",
        workplace: "НМИЦ нейрохирургии им. Бурденко",
        workplace_type: "federal",
        experience_years: 15,
        prepayment: 49000,
        description: "Специализируется на малоинвазивных операциях на позвоночнике",
        skills: &["Эндоскопическая хирургия", "Микрохирургия", "Спинальная хирургия"],
    },
    SeedDoctor {
        full_name: "Петрова Анна Владимировна",
        specialty: "Кардиолог",
        workplace: "НМИЦ кардиологии им. Чазова",
        workplace_type: "federal",
        experience_years: 13,
        prepayment: 45000,
        description: "Ведёт сложные случаи нарушений ритма и сердечной недостаточности",
        skills: &["ЭхоКГ", "Холтеровское мониторирование", "Подбор антиаритмической терапии"],
    },
    SeedDoctor {
        full_name: "Сидоров Михаил Андреевич",
        specialty: "Ортопед-травматолог",
        workplace: "НМИЦ травматологии и ортопедии им. Приорова",
        workplace_type: "federal",
        experience_years: 17,
        prepayment: 52000,
        description: "Эндопротезирование крупных суставов, артроскопия",
        skills: &["Эндопротезирование", "Артроскопия", "Остеосинтез"],
    },
    SeedDoctor {
        full_name: "Кузнецова Елена Игоревна",
        specialty: "Офтальмолог",
        workplace: "НМИЦ глазных болезней им. Гельмгольца",
        workplace_type: "federal",
        experience_years: 10,
        prepayment: 42000,
        description: "Диагностика и лечение заболеваний сетчатки",
        skills: &["ОКТ-диагностика", "Лазерная коагуляция", "Факоэмульсификация"],
    },
    SeedDoctor {
        full_name: "Морозов Дмитрий Николаевич",
        specialty: "ЛОР",
        workplace: "Клиника «МедГород»",
        workplace_type: "private",
        experience_years: 14,
        prepayment: 38000,
        description: "Эндоскопическая хирургия носа и околоносовых пазух",
        skills: &["Эндоскопия", "Септопластика", "Аудиометрия"],
    },
    SeedDoctor {
        full_name: "Волкова Ольга Сергеевна",
        specialty: "Онколог",
        workplace: "НМИЦ онкологии им. Блохина",
        workplace_type: "federal",
        experience_years: 12,
        prepayment: 47000,
        description: "Консультирует по подбору схем лекарственной терапии",
        skills: &["Химиотерапия", "Таргетная терапия", "Онкоконсилиумы"],
    },
];

/// Заполняет каталог врачей стартовым набором. Выполняется только
/// на пустой таблице, повторный запуск ничего не меняет.
pub async fn seed_doctors(pool: &SqlitePool) -> Result<()> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM doctors")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(());
    }

    for doc in SEED_DOCTORS {
        let skills_json = serde_json::to_string(doc.skills)?;
        sqlx::query(
            r#"INSERT INTO doctors (
                id, full_name, specialty, workplace, workplace_type,
                experience_years, prepayment, description, skills,
                status, successful_visits_count, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'active', 0, datetime('now'), datetime('now'))"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(doc.full_name)
        .bind(doc.specialty)
        .bind(doc.workplace)
        .bind(doc.workplace_type)
        .bind(doc.experience_years)
        .bind(doc.prepayment)
        .bind(doc.description)
        .bind(skills_json)
        .execute(pool)
        .await?;
    }

    log::info!("🩺 Seeded doctor catalog with {} entries", SEED_DOCTORS.len());
    Ok(())
}

// ==================== DATABASE RESET (DEVELOPMENT ONLY) ====================

pub async fn reset_database(pool: &SqlitePool) -> Result<()> {
    log::warn!("Resetting database - all data will be lost!");

    let drop_queries = [
        "DROP TABLE IF EXISTS orders",
        "DROP TABLE IF EXISTS doctors",
        "DROP TABLE IF EXISTS clinics",
        "DROP TABLE IF EXISTS admins",
    ];

    for query in drop_queries.iter() {
        let _ = sqlx::query(query).execute(pool).await;
    }

    run_migrations(pool).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[actix_rt::test]
    async fn test_migrations_are_idempotent() {
        let pool = test_pool().await;
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();
    }

    #[actix_rt::test]
    async fn test_seed_runs_once() {
        let pool = test_pool().await;
        run_migrations(&pool).await.unwrap();

        seed_doctors(&pool).await.unwrap();
        let (first,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM doctors")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(first, 6);

        seed_doctors(&pool).await.unwrap();
        let (second,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM doctors")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(second, first);
    }

    #[actix_rt::test]
    async fn test_order_status_check_constraint() {
        let pool = test_pool().await;
        run_migrations(&pool).await.unwrap();

        let result = sqlx::query(
            r#"INSERT INTO orders (
                id, clinic_id, patient_count, status, contact_person, contact_phone,
                created_at, updated_at
            ) VALUES ('o1', 'c1', 10, 'pending', 'Иванова', '+79001234567',
                datetime('now'), datetime('now'))"#,
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }
}
