pub mod wiki_db;

pub use self::wiki_db::WikiDbService;
