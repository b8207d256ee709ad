mod test_app;
mod test_archive;
mod test_config;
mod test_registry;
mod test_usercode;
