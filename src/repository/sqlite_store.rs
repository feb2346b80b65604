// ==========================================
// SCADA 物料消耗对账系统 - SQLite 存储实现
// ==========================================
// 职责: 在调用方提供的连接/事务上实现各存储接口
// 红线: Repository 不含业务逻辑，只做数据映射
// ==========================================

mod ledger;
mod oee;
mod order;
mod weight;

#[cfg(test)]
mod tests;

use crate::repository::error::RepositoryResult;
use rusqlite::types::Type;
use rusqlite::Connection;

// ==========================================
// SqliteStore - 借用连接的存储实现
// ==========================================
// 说明: 借用 &Connection（Transaction 可自动解引用），
// 由调用方决定事务边界与锁范围
pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    /// 在已有连接（或事务）上创建存储
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub(super) fn conn(&self) -> &'c Connection {
        self.conn
    }

    /// 在 SAVEPOINT 中执行闭包，失败时回滚到保存点
    ///
    /// 说明: 无论外层是否已有事务，闭包内的多条写入都整体生效或整体撤销
    pub(super) fn in_savepoint<T>(
        &self,
        name: &str,
        f: impl FnOnce() -> RepositoryResult<T>,
    ) -> RepositoryResult<T> {
        self.conn.execute_batch(&format!("SAVEPOINT {}", name))?;
        match f() {
            Ok(value) => {
                self.conn.execute_batch(&format!("RELEASE {}", name))?;
                Ok(value)
            }
            Err(e) => {
                let rollback = format!("ROLLBACK TO {name}; RELEASE {name}", name = name);
                if let Err(rb_err) = self.conn.execute_batch(&rollback) {
                    tracing::error!(savepoint = name, error = %rb_err, "回滚保存点失败");
                }
                Err(e)
            }
        }
    }
}

/// 行映射时的文本字段转换失败
pub(super) fn conversion_error(col: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(col, Type::Text, message.into())
}
