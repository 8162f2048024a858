pub mod heap_dump;
