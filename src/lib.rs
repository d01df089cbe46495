//!
//! #  EcoRide - a carpooling marketplace
//!
//! Drivers publish rides, passengers pay for seats with platform credits and
//! review the driver once the ride is over, which releases the driver's payout.
//!
//! Rides, bookings and reviews live in MongoDB. Accounts, credit balances,
//! vehicles and rating summaries live in MySQL. Every flow that touches both
//! is written as a saga with explicit compensations:
//!
//! * Booking a ride (debit, seat reservation, booking, link)
//! * Canceling a booking, by the passenger or through a canceled ride
//! * Reviewing a completed booking and paying the driver
//!

#[macro_use]
extern crate rocket;

pub mod config;
pub mod error;
pub mod ledger;
pub mod marketplace;
pub mod notify;
pub mod odm;
pub mod routes;

#[cfg(test)]
mod tests;
