//! Embedded schema migrations, oldest first.
//!
//! Bodies use `IF NOT EXISTS` so a step re-run by hand is harmless.

use super::Migration;

pub static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "currencies, accounts and balances",
        sql: CORE_TABLES_SQL,
    },
    Migration {
        version: 2,
        description: "ledger entries",
        sql: LEDGER_ENTRIES_SQL,
    },
    Migration {
        version: 3,
        description: "currency starting balance and overdraft policy",
        sql: CURRENCY_POLICY_SQL,
    },
];

// ============================================================
// V1: CORE TABLES
// ============================================================

const CORE_TABLES_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS currencies (
    id                TEXT PRIMARY KEY,
    name_singular     TEXT NOT NULL,
    name_plural       TEXT NOT NULL,
    symbol            TEXT NOT NULL,
    fractional_digits SMALLINT NOT NULL CHECK (fractional_digits BETWEEN 0 AND 8),
    is_default        BOOLEAN NOT NULL DEFAULT FALSE
);

-- At most one default currency
CREATE UNIQUE INDEX IF NOT EXISTS idx_currencies_single_default
    ON currencies (is_default) WHERE is_default;

CREATE TABLE IF NOT EXISTS accounts (
    id         UUID PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Amounts are minor units scaled by the currency's fractional_digits
CREATE TABLE IF NOT EXISTS balances (
    account_id  UUID NOT NULL REFERENCES accounts (id),
    currency_id TEXT NOT NULL REFERENCES currencies (id),
    amount      BIGINT NOT NULL DEFAULT 0,
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (account_id, currency_id)
);
"#;

// ============================================================
// V2: LEDGER ENTRIES
// ============================================================

const LEDGER_ENTRIES_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS ledger_entries (
    id                UUID PRIMARY KEY,
    seq               BIGSERIAL NOT NULL,
    account_id        UUID NOT NULL REFERENCES accounts (id),
    currency_id       TEXT NOT NULL REFERENCES currencies (id),
    delta             BIGINT NOT NULL,
    resulting_balance BIGINT NOT NULL,
    cause             TEXT NOT NULL,
    correlation_id    UUID,
    reason            TEXT,
    created_at        TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_ledger_entries_account
    ON ledger_entries (account_id, seq DESC);
"#;

// ============================================================
// V3: CURRENCY POLICY
// ============================================================

const CURRENCY_POLICY_SQL: &str = r#"
ALTER TABLE currencies ADD COLUMN IF NOT EXISTS starting_balance BIGINT NOT NULL DEFAULT 0;
ALTER TABLE currencies ADD COLUMN IF NOT EXISTS allow_overdraft BOOLEAN NOT NULL DEFAULT FALSE;
ALTER TABLE currencies ADD COLUMN IF NOT EXISTS overdraft_floor BIGINT NOT NULL DEFAULT 0;
"#;
