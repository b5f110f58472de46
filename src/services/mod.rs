pub mod operator_directory;
