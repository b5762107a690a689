/*
[INPUT]:  Parsed subcommands from main
[OUTPUT]: Interactive and reporting command implementations
[POS]:    CLI layer - command modules
[UPDATE]: When adding subcommands
*/

pub mod commands;
pub mod init;
