pub mod csv_directory;
