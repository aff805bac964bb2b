mod classic;
mod parallel;
mod symmetric;
