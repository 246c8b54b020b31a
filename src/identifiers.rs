//! Human-facing identifiers: order numbers and payment references.
//!
//! Candidates are random. The unique index on the column is the authority:
//! each attempt inserts inside a savepoint, and a unique violation rolls the
//! savepoint back and draws a fresh candidate, up to [`MAX_ATTEMPTS`] times.

use chrono::Utc;
use rand::Rng;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, DbErr, EntityTrait, IntoActiveModel, SqlErr,
    TransactionTrait,
};

use crate::error::{AppError, AppResult};

pub const MAX_ATTEMPTS: usize = 5;

const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// `ORD` + `YYYYMMDD` + six random digits.
pub fn order_number_candidate() -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("ORD{date}{suffix:06}")
}

/// `PAY` + last eight digits of the unix timestamp + six random characters.
pub fn payment_reference_candidate() -> String {
    let timestamp = Utc::now().timestamp().to_string();
    let tail = &timestamp[timestamp.len().saturating_sub(8)..];
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| REFERENCE_ALPHABET[rng.gen_range(0..REFERENCE_ALPHABET.len())] as char)
        .collect();
    format!("PAY{tail}{suffix}")
}

pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Insert the row `build` makes from a fresh identifier, retrying on a
/// unique-index collision. `kind` names the identifier in logs and errors.
pub async fn insert_unique<C, A, F, B>(
    conn: &C,
    kind: &'static str,
    mut candidate: F,
    build: B,
) -> AppResult<<A::Entity as EntityTrait>::Model>
where
    C: TransactionTrait,
    A: ActiveModelTrait + ActiveModelBehavior + Send,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    F: FnMut() -> String,
    B: Fn(String) -> A,
{
    for attempt in 1..=MAX_ATTEMPTS {
        let identifier = candidate();
        let savepoint = conn.begin().await?;
        match build(identifier.clone()).insert(&savepoint).await {
            Ok(model) => {
                savepoint.commit().await?;
                return Ok(model);
            }
            Err(err) if is_unique_violation(&err) => {
                savepoint.rollback().await?;
                tracing::debug!(attempt, kind, %identifier, "identifier collision, regenerating");
            }
            Err(err) => return Err(err.into()),
        }
    }
    tracing::error!(kind, attempts = MAX_ATTEMPTS, "identifier space exhausted");
    Err(AppError::IdentifierExhausted(kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_number_has_prefix_date_and_six_digits() {
        let number = order_number_candidate();
        assert_eq!(number.len(), 17);
        assert!(number.starts_with("ORD"));
        assert!(number[3..].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(&number[3..11], Utc::now().format("%Y%m%d").to_string());
    }

    #[test]
    fn payment_reference_is_uppercase_alphanumeric() {
        let reference = payment_reference_candidate();
        assert_eq!(reference.len(), 17);
        assert!(reference.starts_with("PAY"));
        assert!(
            reference[3..]
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }
}
