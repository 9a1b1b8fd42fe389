//! Job-description scraping: the producer side of the `jd-scrapper` queue.

pub mod handlers;
pub mod producer;

pub use producer::{scrape_job_options, ScrapeJobRequest, ScrapeProducer, QUEUE_NAME, TASK_NAME};
