//! Mock backends with shared handles, so tests can script and inspect them
//! after handing them to a CPU.
