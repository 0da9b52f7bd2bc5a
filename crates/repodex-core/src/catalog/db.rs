//! SQLite catalog database
//!
//! Channels, packages, members and package versions. Package names are
//! unique per channel; versions are unique per
//! (package, version, build, platform, filename).

use std::path::Path;

use repodex_schema::{
    Channel, ChannelDescriptor, Identity, Member, NewPackageVersion, Package, PackageVersion,
    Platform, Role, Sha256Hash,
};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{CatalogError, Upsert, now_timestamp};

const VERSION_COLUMNS: &str = "v.id, p.channel, p.name, v.version, v.build, v.build_number, \
     v.platform, v.filename, v.size, v.sha256, v.uploader, v.created_at";

/// Synchronous catalog over a single SQLite connection.
///
/// Not `Sync`; share it through [`super::SqliteCatalog`].
pub struct CatalogDb {
    conn: Connection,
}

impl std::fmt::Debug for CatalogDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogDb").finish_non_exhaustive()
    }
}

impl CatalogDb {
    /// Open (or create) the catalog at `path`.
    pub fn open_at(path: &Path) -> Result<Self, CatalogError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        Self::init(conn)
    }

    /// Open a private in-memory catalog.
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CatalogError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), CatalogError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS channels (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                private INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS channel_members (
                channel TEXT NOT NULL REFERENCES channels(name) ON DELETE CASCADE,
                identity TEXT NOT NULL,
                role TEXT NOT NULL,
                PRIMARY KEY (channel, identity)
            );

            CREATE TABLE IF NOT EXISTS packages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                channel TEXT NOT NULL REFERENCES channels(name) ON DELETE CASCADE,
                name TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE (channel, name)
            );

            CREATE TABLE IF NOT EXISTS package_members (
                package_id INTEGER NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
                identity TEXT NOT NULL,
                role TEXT NOT NULL,
                PRIMARY KEY (package_id, identity)
            );

            CREATE TABLE IF NOT EXISTS package_versions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                package_id INTEGER NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
                version TEXT NOT NULL,
                build TEXT NOT NULL,
                build_number INTEGER NOT NULL,
                platform TEXT NOT NULL,
                filename TEXT NOT NULL,
                size INTEGER NOT NULL,
                sha256 TEXT,
                uploader TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE (package_id, version, build, platform, filename)
            );

            CREATE INDEX IF NOT EXISTS idx_packages_channel ON packages(channel);
            CREATE INDEX IF NOT EXISTS idx_versions_package ON package_versions(package_id);
            ",
        )?;
        Ok(())
    }

    pub fn create_channel(
        &self,
        descriptor: &ChannelDescriptor,
        owner: &Identity,
        role: Role,
    ) -> Result<Channel, CatalogError> {
        if self.get_channel(&descriptor.name)?.is_some() {
            return Err(CatalogError::ChannelExists(descriptor.name.clone()));
        }
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO channels (name, private) VALUES (?1, ?2)",
            params![descriptor.name, descriptor.private],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO channel_members (channel, identity, role) VALUES (?1, ?2, ?3)",
            params![descriptor.name, owner.as_str(), role.as_str()],
        )?;
        tx.commit()?;

        Ok(Channel {
            id,
            name: descriptor.name.clone(),
            private: descriptor.private,
        })
    }

    pub fn get_channel(&self, name: &str) -> Result<Option<Channel>, CatalogError> {
        let channel = self
            .conn
            .query_row(
                "SELECT id, name, private FROM channels WHERE name = ?1",
                params![name],
                channel_from_row,
            )
            .optional()?;
        Ok(channel)
    }

    pub fn list_channels(&self) -> Result<Vec<Channel>, CatalogError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, private FROM channels ORDER BY id")?;
        let channels = stmt.query_map([], channel_from_row)?;
        channels.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn list_channel_members(
        &self,
        channel: &str,
    ) -> Result<Vec<(Identity, Role)>, CatalogError> {
        let mut stmt = self.conn.prepare(
            "SELECT identity, role FROM channel_members WHERE channel = ?1 ORDER BY rowid",
        )?;
        let members = stmt.query_map(params![channel], |row| {
            Ok((Identity::new(row.get::<_, String>(0)?), role_at(row, 1)?))
        })?;
        members.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn upsert_package(
        &self,
        channel: &str,
        name: &str,
    ) -> Result<Upsert<Package>, CatalogError> {
        if self.get_channel(channel)?.is_none() {
            return Err(CatalogError::ChannelNotFound(channel.to_string()));
        }
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO packages (channel, name, created_at) VALUES (?1, ?2, ?3)",
            params![channel, name, now_timestamp()],
        )?;
        let package = self.get_package(channel, name)?.ok_or_else(|| {
            CatalogError::PackageNotFound {
                channel: channel.to_string(),
                package: name.to_string(),
            }
        })?;
        Ok(Upsert {
            row: package,
            created: inserted == 1,
        })
    }

    pub fn get_package(&self, channel: &str, name: &str) -> Result<Option<Package>, CatalogError> {
        let package = self
            .conn
            .query_row(
                "SELECT id, channel, name FROM packages WHERE channel = ?1 AND name = ?2",
                params![channel, name],
                package_from_row,
            )
            .optional()?;
        Ok(package)
    }

    pub fn list_packages(&self, channel: &str) -> Result<Vec<Package>, CatalogError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, channel, name FROM packages WHERE channel = ?1 ORDER BY id")?;
        let packages = stmt.query_map(params![channel], package_from_row)?;
        packages.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn attach_member(
        &self,
        package_id: i64,
        identity: &Identity,
        role: Role,
    ) -> Result<Upsert<Member>, CatalogError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM packages WHERE id = ?1)",
            params![package_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(CatalogError::PackageIdNotFound(package_id));
        }

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO package_members (package_id, identity, role) VALUES (?1, ?2, ?3)",
            params![package_id, identity.as_str(), role.as_str()],
        )?;
        let member = self.conn.query_row(
            "SELECT package_id, identity, role FROM package_members
             WHERE package_id = ?1 AND identity = ?2",
            params![package_id, identity.as_str()],
            member_from_row,
        )?;
        Ok(Upsert {
            row: member,
            created: inserted == 1,
        })
    }

    pub fn list_members(&self, package_id: i64) -> Result<Vec<Member>, CatalogError> {
        let mut stmt = self.conn.prepare(
            "SELECT package_id, identity, role FROM package_members
             WHERE package_id = ?1 ORDER BY rowid",
        )?;
        let members = stmt.query_map(params![package_id], member_from_row)?;
        members.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn upsert_version(
        &self,
        version: &NewPackageVersion,
    ) -> Result<Upsert<PackageVersion>, CatalogError> {
        let package = self
            .get_package(&version.channel, &version.package)?
            .ok_or_else(|| CatalogError::PackageNotFound {
                channel: version.channel.clone(),
                package: version.package.clone(),
            })?;

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO package_versions
                (package_id, version, build, build_number, platform, filename,
                 size, sha256, uploader, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                package.id,
                version.version,
                version.build,
                version.build_number as i64,
                version.platform.as_str(),
                version.filename,
                version.size as i64,
                version.sha256.as_ref().map(Sha256Hash::as_str),
                version.uploader.as_str(),
                now_timestamp(),
            ],
        )?;

        let sql = format!(
            "SELECT {VERSION_COLUMNS} FROM package_versions v
             JOIN packages p ON p.id = v.package_id
             WHERE v.package_id = ?1 AND v.version = ?2 AND v.build = ?3
               AND v.platform = ?4 AND v.filename = ?5"
        );
        let row = self.conn.query_row(
            &sql,
            params![
                package.id,
                version.version,
                version.build,
                version.platform.as_str(),
                version.filename,
            ],
            version_from_row,
        )?;
        Ok(Upsert {
            row,
            created: inserted == 1,
        })
    }

    pub fn list_versions(&self, channel: &str) -> Result<Vec<PackageVersion>, CatalogError> {
        let sql = format!(
            "SELECT {VERSION_COLUMNS} FROM package_versions v
             JOIN packages p ON p.id = v.package_id
             WHERE p.channel = ?1 ORDER BY v.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let versions = stmt.query_map(params![channel], version_from_row)?;
        versions.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn delete_version(&self, id: i64) -> Result<bool, CatalogError> {
        let deleted = self
            .conn
            .execute("DELETE FROM package_versions WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    /// Delete a channel; members, packages and versions go with it.
    pub fn delete_channel(&self, name: &str) -> Result<bool, CatalogError> {
        let deleted = self
            .conn
            .execute("DELETE FROM channels WHERE name = ?1", params![name])?;
        Ok(deleted > 0)
    }
}

fn channel_from_row(row: &Row<'_>) -> rusqlite::Result<Channel> {
    Ok(Channel {
        id: row.get(0)?,
        name: row.get(1)?,
        private: row.get(2)?,
    })
}

fn package_from_row(row: &Row<'_>) -> rusqlite::Result<Package> {
    Ok(Package {
        id: row.get(0)?,
        channel: row.get(1)?,
        name: row.get(2)?,
    })
}

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<Member> {
    Ok(Member {
        package_id: row.get(0)?,
        identity: Identity::new(row.get::<_, String>(1)?),
        role: role_at(row, 2)?,
    })
}

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<PackageVersion> {
    let platform: String = row.get(6)?;
    let platform = Platform::new(platform).map_err(|e| conversion_error(6, e))?;
    let sha256: Option<String> = row.get(9)?;
    Ok(PackageVersion {
        id: row.get(0)?,
        channel: row.get(1)?,
        package: row.get(2)?,
        version: row.get(3)?,
        build: row.get(4)?,
        build_number: row.get::<_, i64>(5)? as u64,
        platform,
        filename: row.get(7)?,
        size: row.get::<_, i64>(8)? as u64,
        sha256: sha256.map(Sha256Hash::new),
        uploader: Identity::new(row.get::<_, String>(10)?),
        created_at: row.get(11)?,
    })
}

fn role_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Role> {
    let role: String = row.get(idx)?;
    role.parse().map_err(|e| conversion_error(idx, e))
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}
