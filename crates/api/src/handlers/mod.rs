pub mod roms;
