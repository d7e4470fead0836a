// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod nvic;
pub mod port;
pub mod register_file;
pub mod sercom_usart;
pub mod tc;
