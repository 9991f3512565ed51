//! Post-copy fixups on the target: denormalized counters and identities.
//!
//! Both steps are best effort. A failure is logged and the run continues.

use tracing::{debug, info, warn};

use crate::core::identifier::validate_table_name;
use crate::core::schema::{Board, BoardType};
use crate::core::traits::{Dialect, SequenceStrategy, Session};
use crate::error::Result;
use crate::schema::BoardSchema;
use crate::transfer::policy::needs_sequence_reset;

/// Correlated `UPDATE` statements recomputing the counters of one board
/// table, limited to the counter columns the table actually has.
pub fn aggregate_statements<D: Dialect + ?Sized>(
    dialect: &D,
    board: &Board,
    columns: &[String],
) -> Vec<String> {
    let has = |name: &str| columns.iter().any(|c| c.eq_ignore_ascii_case(name));
    let table = dialect.quote_ident(&board.table_name);
    let id = format!("{}.{}", table, dialect.quote_ident("id"));
    let mut statements = Vec::new();

    if has("comment_count") {
        let comments = dialect.quote_ident("comments");
        statements.push(format!(
            "UPDATE {t} SET {col} = (SELECT COUNT(*) FROM {c} WHERE {c}.{post} = {id} AND {c}.{board} = {board_id})",
            t = table,
            col = dialect.quote_ident("comment_count"),
            c = comments,
            post = dialect.quote_ident("post_id"),
            board = dialect.quote_ident("board_id"),
            id = id,
            board_id = board.id,
        ));
    }

    if board.board_type != BoardType::Qna {
        let votes = dialect.quote_ident("post_votes");
        for (column, value) in [("like_count", 1), ("dislike_count", -1)] {
            if !has(column) {
                continue;
            }
            statements.push(format!(
                "UPDATE {t} SET {col} = (SELECT COUNT(*) FROM {v} WHERE {v}.{post} = {id} AND {v}.{board} = {board_id} AND {v}.{value_col} = {value})",
                t = table,
                col = dialect.quote_ident(column),
                v = votes,
                post = dialect.quote_ident("post_id"),
                board = dialect.quote_ident("board_id"),
                value_col = dialect.quote_ident("value"),
                id = id,
                board_id = board.id,
                value = value,
            ));
        }
    }
    statements
}

/// Recompute comment and vote counters of every board table. Returns the
/// number of tables updated.
pub async fn recompute_aggregates(session: &mut dyn Session, boards: &[Board]) -> usize {
    let mut updated = 0;
    for board in boards {
        let columns = match BoardSchema::new(&mut *session)
            .columns(&board.table_name)
            .await
        {
            Ok(cols) => cols.into_iter().map(|c| c.name).collect::<Vec<_>>(),
            Err(e) => {
                warn!("{}: skipping counter recompute: {}", board.table_name, e);
                continue;
            }
        };

        let statements = aggregate_statements(session.dialect(), board, &columns);
        if statements.is_empty() {
            continue;
        }
        let mut ok = true;
        for sql in &statements {
            if let Err(e) = session.execute(sql).await {
                warn!("{}: counter recompute failed: {}", board.table_name, e);
                ok = false;
            }
        }
        if ok {
            updated += 1;
        }
    }
    info!("Recomputed counters on {} board tables", updated);
    updated
}

/// Move identity sequences past the copied ids. Returns the number of tables
/// reset.
pub async fn reset_sequences(session: &mut dyn Session, tables: &[String]) -> usize {
    if session.dialect().sequence_strategy() == SequenceStrategy::Implicit {
        debug!("Identities follow the data on {}, nothing to reset", session.dialect().name());
        return 0;
    }

    let mut reset = 0;
    for table in tables.iter().filter(|t| needs_sequence_reset(t)) {
        match reset_one(session, table).await {
            Ok(true) => reset += 1,
            Ok(false) => debug!("{}: no identity to reset", table),
            Err(e) => warn!("{}: sequence reset failed: {}", table, e),
        }
    }
    info!("Reset identity sequences on {} tables", reset);
    reset
}

async fn reset_one(session: &mut dyn Session, table: &str) -> Result<bool> {
    validate_table_name(table)?;
    let Some(check) = session.dialect().sequence_check_query(table) else {
        return Ok(false);
    };
    if session.query_i64(&check).await?.unwrap_or(0) == 0 {
        return Ok(false);
    }

    let max_sql = format!(
        "SELECT COALESCE(MAX({}), 0) FROM {}",
        session.dialect().quote_ident("id"),
        session.dialect().quote_ident(table)
    );
    let max_id = session.query_i64(&max_sql).await?.unwrap_or(0);
    if max_id == 0 && session.dialect().sequence_strategy() == SequenceStrategy::AutoIncrement {
        return Ok(false);
    }
    let Some(statement) = session.dialect().sequence_reset_statement(table, max_id) else {
        return Ok(false);
    };
    session.execute(&statement).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{MysqlDialect, SqliteDialect};

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_aggregates_cover_existing_counters() {
        let board = Board::new(4, "free", "board_free");
        let sql = aggregate_statements(
            &SqliteDialect::new(),
            &board,
            &cols(&["id", "comment_count", "like_count", "dislike_count"]),
        );
        assert_eq!(sql.len(), 3);
        assert_eq!(
            sql[0],
            "UPDATE \"board_free\" SET \"comment_count\" = (SELECT COUNT(*) FROM \"comments\" \
             WHERE \"comments\".\"post_id\" = \"board_free\".\"id\" AND \"comments\".\"board_id\" = 4)"
        );
        assert!(sql[2].ends_with("\"post_votes\".\"value\" = -1)"));
    }

    #[test]
    fn test_qna_boards_skip_vote_counters() {
        let board = Board::new(2, "qna", "board_qna").with_type(BoardType::Qna);
        let sql = aggregate_statements(
            &MysqlDialect::new(),
            &board,
            &cols(&["id", "comment_count", "like_count"]),
        );
        assert_eq!(sql.len(), 1);
        assert!(sql[0].starts_with("UPDATE `board_qna` SET `comment_count`"));
    }

    #[test]
    fn test_missing_counter_columns_produce_nothing() {
        let board = Board::new(1, "legacy", "board_legacy");
        assert!(aggregate_statements(&SqliteDialect::new(), &board, &cols(&["id", "title"])).is_empty());
    }
}
