pub mod filter;
pub mod itinerary;
pub mod place;
pub mod recommendation;
pub mod route;
