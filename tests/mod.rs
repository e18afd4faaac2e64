mod client;
mod extraction;
mod live;
