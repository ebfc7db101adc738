/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains the programmatic Firmware Image Package generator used
    by host tooling and test suites.

--*/

mod generator;

pub use generator::FipBuilder;
