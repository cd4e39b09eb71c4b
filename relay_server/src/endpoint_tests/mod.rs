mod helpers;
mod webhook;
