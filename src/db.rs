use crate::models::{RawTransfer, Voucher};
use chrono::{DateTime, Utc};
use eyre::Result;
use rusqlite::{params, Connection};

const INIT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS vouchers (
  voucher_address TEXT NOT NULL PRIMARY KEY,
  voucher_name    TEXT NOT NULL,
  symbol          TEXT NOT NULL,
  decimals        INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS transfers (
  id                INTEGER PRIMARY KEY AUTOINCREMENT,
  sender_address    TEXT NOT NULL,
  recipient_address TEXT NOT NULL,
  contract_address  TEXT NOT NULL,
  tx_value          TEXT NOT NULL, -- raw u128 stored as string
  date_block        TEXT NOT NULL, -- RFC3339
  success           INTEGER NOT NULL
);
"#;

/// Connect to SQLite (with WAL mode for performance)
pub fn connect(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    Ok(conn)
}

/// Run schema migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(INIT_SQL)?;
    Ok(())
}

/// Replace the cached snapshot wholesale, in one transaction. The upstream
/// returns the complete dataset every time, so there is nothing to merge.
pub fn replace_snapshot(
    conn: &mut Connection,
    vouchers: &[Voucher],
    transfers: &[RawTransfer],
) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute("DELETE FROM vouchers", [])?;
    for voucher in vouchers {
        tx.execute(
            "INSERT INTO vouchers (voucher_address, voucher_name, symbol, decimals)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                voucher.voucher_address,
                voucher.voucher_name,
                voucher.symbol,
                voucher.decimals
            ],
        )?;
    }

    tx.execute("DELETE FROM transfers", [])?;
    for transfer in transfers {
        tx.execute(
            "INSERT INTO transfers (
                sender_address, recipient_address, contract_address,
                tx_value, date_block, success
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                transfer.sender_address,
                transfer.recipient_address,
                transfer.contract_address,
                transfer.tx_value.to_string(),
                transfer.date_block.to_rfc3339(),
                transfer.success as i64
            ],
        )?;
    }

    tx.commit()?;
    Ok(())
}

/// Load the cached snapshot, for starting up while the upstream is down
pub fn load_snapshot(conn: &Connection) -> Result<(Vec<Voucher>, Vec<RawTransfer>)> {
    let mut stmt =
        conn.prepare("SELECT voucher_address, voucher_name, symbol, decimals FROM vouchers")?;
    let vouchers = stmt
        .query_map([], |row| {
            Ok(Voucher {
                voucher_address: row.get(0)?,
                voucher_name: row.get(1)?,
                symbol: row.get(2)?,
                decimals: row.get(3)?,
            })
        })?
        .filter_map(std::result::Result::ok)
        .collect();

    let mut stmt = conn.prepare(
        "SELECT sender_address, recipient_address, contract_address, tx_value, date_block, success
         FROM transfers",
    )?;
    let transfers = stmt
        .query_map([], |row| {
            let tx_value: String = row.get(3)?;
            let date_block: String = row.get(4)?;
            let success: i64 = row.get(5)?;
            Ok(RawTransfer {
                sender_address: row.get(0)?,
                recipient_address: row.get(1)?,
                contract_address: row.get(2)?,
                tx_value: tx_value.parse().unwrap_or(0),
                date_block: DateTime::parse_from_rfc3339(&date_block)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
                success: success != 0,
            })
        })?
        .filter_map(std::result::Result::ok)
        .collect();

    Ok((vouchers, transfers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn open_memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn snapshot_round_trips() {
        let mut conn = open_memory();
        let vouchers = vec![Voucher {
            voucher_address: "0xX".to_string(),
            voucher_name: "X Voucher".to_string(),
            symbol: "X".to_string(),
            decimals: 6,
        }];
        let transfers = vec![RawTransfer {
            sender_address: "A".to_string(),
            recipient_address: "B".to_string(),
            contract_address: "0xX".to_string(),
            tx_value: 340_282_366_920_938_463_463_374_607_431_768_211_455, // u128::MAX survives
            date_block: Utc.timestamp_opt(100, 0).unwrap(),
            success: true,
        }];

        replace_snapshot(&mut conn, &vouchers, &transfers).unwrap();
        let (loaded_vouchers, loaded_transfers) = load_snapshot(&conn).unwrap();
        assert_eq!(loaded_vouchers.len(), 1);
        assert_eq!(loaded_vouchers[0].decimals, 6);
        assert_eq!(loaded_transfers.len(), 1);
        assert_eq!(loaded_transfers[0].tx_value, u128::MAX);
        assert_eq!(loaded_transfers[0].date_block, Utc.timestamp_opt(100, 0).unwrap());
    }

    #[test]
    fn replace_discards_the_previous_snapshot() {
        let mut conn = open_memory();
        let transfer = RawTransfer {
            sender_address: "A".to_string(),
            recipient_address: "B".to_string(),
            contract_address: "0xX".to_string(),
            tx_value: 1,
            date_block: Utc.timestamp_opt(100, 0).unwrap(),
            success: true,
        };
        replace_snapshot(&mut conn, &[], &[transfer.clone(), transfer]).unwrap();
        replace_snapshot(&mut conn, &[], &[]).unwrap();

        let (_, transfers) = load_snapshot(&conn).unwrap();
        assert!(transfers.is_empty());
    }
}
