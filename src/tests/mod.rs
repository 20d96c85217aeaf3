mod unit_query_catalog;
mod unit_sqlite_pages_database;
